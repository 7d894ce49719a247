//! Keybinding dispatch.
//!
//! Bindings key on `(modifiers << 32) | keysym`. The keysym used is the raw,
//! untransformed one so the user's mental model survives modifiers: Shift+1
//! dispatches under the sym `1`, not `exclam`. Press callbacks consume the
//! key; releases always reach the focused client regardless, so held keys
//! never end up stuck client-side.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::debug;
use xkeysym::Keysym;

use crate::shell::ShellRequest;
use crate::Server;

bitflags! {
    /// Keyboard modifier mask, wire order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CAPS = 1 << 1;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const LOGO = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

pub type BindCallback = Rc<dyn Fn(&mut Server)>;

/// One registered binding: optional press/release pair plus metadata for
/// the binding dump.
#[derive(Default, Clone)]
pub struct KeybindInfo {
    pub on_press: Option<BindCallback>,
    pub on_release: Option<BindCallback>,
    pub group: Option<String>,
    pub description: Option<String>,
}

impl KeybindInfo {
    pub fn press(callback: BindCallback) -> Self {
        Self {
            on_press: Some(callback),
            ..Default::default()
        }
    }
}

pub type KeybindMap = HashMap<u64, KeybindInfo>;

pub fn keybind_generate_key(modifiers: Modifiers, sym_or_button: u32) -> u64 {
    ((modifiers.bits() as u64) << 32) | sym_or_button as u64
}

fn generated_key_modifiers(key: u64) -> Modifiers {
    Modifiers::from_bits_truncate((key >> 32) as u32)
}

fn generated_key_sym(key: u64) -> u32 {
    (key & 0xffff_ffff) as u32
}

fn modifiers_to_string(modifiers: Modifiers) -> String {
    let mut out = String::new();
    for (flag, name) in [
        (Modifiers::LOGO, "Super + "),
        (Modifiers::CTRL, "Control + "),
        (Modifiers::ALT, "Alt + "),
        (Modifiers::SHIFT, "Shift + "),
        (Modifiers::CAPS, "Caps + "),
        (Modifiers::MOD2, "Mod2 + "),
        (Modifiers::MOD3, "Mod3 + "),
        (Modifiers::MOD5, "Mod5 + "),
    ] {
        if modifiers.contains(flag) {
            out.push_str(name);
        }
    }
    out
}

/// A keyboard key event from the wire server. `keysym` is the raw sym,
/// resolved against an unmodified keymap state.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub time_msec: u32,
    pub keycode: u32,
    pub keysym: Keysym,
    pub modifiers: Modifiers,
    pub pressed: bool,
}

impl Server {
    pub fn keybind_kbd_register(&mut self, modifiers: Modifiers, keysym: Keysym, info: KeybindInfo) {
        let key = keybind_generate_key(modifiers, keysym.into());
        self.keybinds.insert(key, info);
    }

    pub fn keybind_kbd_remove(&mut self, modifiers: Modifiers, keysym: Keysym) {
        let key = keybind_generate_key(modifiers, keysym.into());
        self.keybinds.remove(&key);
    }

    pub fn keybind_mouse_register(&mut self, modifiers: Modifiers, button: u32, info: KeybindInfo) {
        let key = keybind_generate_key(modifiers, button);
        self.mouse_binds.insert(key, info);
    }

    pub fn keybind_mouse_remove(&mut self, modifiers: Modifiers, button: u32) {
        let key = keybind_generate_key(modifiers, button);
        self.mouse_binds.remove(&key);
    }

    fn keybind_execute(&mut self, mouse: bool, modifiers: Modifiers, sym: u32, press: bool) -> bool {
        let map = if mouse { &self.mouse_binds } else { &self.keybinds };
        let Some(info) = map.get(&keybind_generate_key(modifiers, sym)) else {
            return false;
        };
        let callback = if press {
            info.on_press.clone()
        } else {
            info.on_release.clone()
        };
        if let Some(callback) = callback {
            callback(self);
        }
        true
    }

    pub fn keybind_kbd_execute(&mut self, modifiers: Modifiers, keysym: Keysym, press: bool) -> bool {
        self.keybind_execute(false, modifiers, keysym.into(), press)
    }

    pub fn keybind_mouse_execute(&mut self, modifiers: Modifiers, button: u32, press: bool) -> bool {
        self.keybind_execute(true, modifiers, button, press)
    }

    /// Drop every keyboard binding; the VT-switch defaults come back unless
    /// asked otherwise.
    pub fn keybind_kbd_clear(&mut self, clear_common_key: bool) {
        self.keybinds.clear();
        if !clear_common_key {
            self.keybind_register_common_key();
        }
    }

    pub fn keybind_mouse_clear(&mut self) {
        self.mouse_binds.clear();
    }

    /// Ctrl+Alt+F1..F12 switch virtual terminals.
    pub fn keybind_register_common_key(&mut self) {
        for vt in 1..=12u32 {
            let keysym = Keysym::new(u32::from(Keysym::F1) + vt - 1);
            self.keybind_kbd_register(
                Modifiers::CTRL | Modifiers::ALT,
                keysym,
                KeybindInfo::press(Rc::new(move |server: &mut Server| {
                    server.push_request(ShellRequest::SwitchVt { vt });
                })),
            );
        }
    }

    /// Human-readable table of the described keyboard bindings.
    pub fn dump_keybinds_info(&self) -> String {
        let mut out = String::new();
        let mut keys: Vec<_> = self.keybinds.iter().collect();
        keys.sort_by_key(|(key, _)| **key);
        for (key, info) in keys {
            let Some(description) = &info.description else {
                continue;
            };
            let group = info.group.as_deref().unwrap_or("");
            let modifiers = modifiers_to_string(generated_key_modifiers(*key));
            let _ = writeln!(
                out,
                "{group}\t{modifiers}0x{:x}\t\t{description}",
                generated_key_sym(*key)
            );
        }
        out
    }

    /// Keyboard key entry point.
    pub fn handle_key(&mut self, event: KeyEvent) {
        let mut handled = false;
        if event.pressed {
            if !self.session_lock.locked {
                handled |= self.keybind_kbd_execute(event.modifiers, event.keysym, true);
            }
            self.push_request(ShellRequest::NotifyIdleActivity);
        } else {
            // always notify the release even when bound: a client that saw
            // the press while we swallow the release would keep the key
            // logically held forever
            if !self.session_lock.locked {
                self.keybind_kbd_execute(event.modifiers, event.keysym, false);
            }
        }

        if !handled {
            self.push_request(ShellRequest::ForwardKey {
                keycode: event.keycode,
                pressed: event.pressed,
            });
        }
    }

    /// Keyboard modifiers update from the wire server.
    pub fn handle_modifiers(&mut self, modifiers: Modifiers) {
        self.seat.modifiers = modifiers;
        debug!("modifiers now {:?}", modifiers);
    }
}
