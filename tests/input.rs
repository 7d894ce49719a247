//! Input routing tests: grabs, resize scheduling, bindings, session lock.

use std::cell::RefCell;
use std::rc::Rc;

use tessella::input::keyboard::{KeyEvent, KeybindInfo, Modifiers};
use tessella::input::{ConstraintKind, CursorState, Region};
use tessella::shell::{Edges, ShellRequest, ToplevelId};
use tessella::testing::Fixture;
use tessella::utils::Rect;
use xkeysym::Keysym;

fn key(fixture: &mut Fixture, keysym: Keysym, modifiers: Modifiers, pressed: bool) {
    fixture.server.handle_key(KeyEvent {
        time_msec: 0,
        keycode: 30,
        keysym,
        modifiers,
        pressed,
    });
}

/// Interactive move follows the cursor with the grab offset.
#[test]
fn interactive_move_tracks_cursor() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);
    fixture.server.container_set_position(c, 100, 100);

    fixture.server.handle_pointer_motion_absolute(1, 150.0, 150.0);
    fixture.server.start_interactive_move(Some(t));
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Move);

    fixture.server.handle_pointer_motion(2, 30.0, -20.0);
    assert_eq!(fixture.container_box_of(t), Rect::new(130, 80, 640, 480));

    // any button release stops the grab
    fixture.server.handle_pointer_button(3, 0x110, false);
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Normal);
}

/// A tiled toplevel refuses the interactive grab.
#[test]
fn tiled_toplevel_cannot_grab() {
    use tessella::layout::LayoutMode;

    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    let t = fixture.map_toplevel("a");

    fixture.server.start_interactive_move(Some(t));
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Normal);
    fixture.server.start_interactive_resize(Some(t), Edges::RIGHT);
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Normal);
}

/// A motion flood within one refresh interval produces one
/// configure; stopping the grab flushes the final pending rectangle.
#[test]
fn interactive_resize_coalesces_configures() {
    let mut fixture = Fixture::new();
    // 120 Hz: one configure per 8ms
    fixture.add_output_with_refresh("Virtual-1", 1920, 1080, 120_000);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);
    fixture.server.container_set_position(c, 100, 100);

    fixture.server.handle_pointer_motion_absolute(1, 700.0, 500.0);
    fixture
        .server
        .start_interactive_resize(Some(t), Edges::RIGHT | Edges::BOTTOM);
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Resize);
    let t0 = fixture.server.seat.cursor.last_resize_time_msec;

    fixture.drain_requests();

    // first motion falls outside the interval and configures once
    fixture
        .server
        .handle_pointer_motion(t0 as u32 + 10, 1.0, 1.0);
    // 99 more land inside the interval and only update the pending box
    for i in 0..99 {
        let time = t0 as u32 + 11 + (i / 20);
        fixture.server.handle_pointer_motion(time, 1.0, 0.0);
    }

    let requests = fixture.drain_requests();
    assert_eq!(Fixture::count_configures(&requests, t), 1);
    assert!(fixture.server.seat.cursor.pending_box.is_some());

    // the flush applies the final rectangle
    fixture.server.stop_interactive();
    let requests = fixture.drain_requests();
    assert_eq!(Fixture::count_configures(&requests, t), 1);
    assert_eq!(fixture.server.seat.cursor.pending_box, None);
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Normal);
}

/// Unspecified resize edges are inferred from the pointer position inside
/// the geometry box.
#[test]
fn resize_edge_inference() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);
    fixture.server.container_set_position(c, 0, 0);

    // dead center leans to the bottom-right corner pair
    fixture.server.handle_pointer_motion_absolute(1, 320.0, 240.0);
    fixture.server.start_interactive_resize(None, Edges::empty());
    assert_eq!(
        fixture.server.seat.cursor.resize_edges,
        Edges::RIGHT | Edges::BOTTOM
    );
    fixture.server.stop_interactive();

    // centered horizontally near the top edge picks the single top edge
    fixture.server.handle_pointer_motion_absolute(2, 320.0, 20.0);
    fixture.server.start_interactive_resize(None, Edges::empty());
    assert_eq!(fixture.server.seat.cursor.resize_edges, Edges::TOP);
    fixture.server.stop_interactive();

    // top-left region resolves to the corner pair
    fixture.server.handle_pointer_motion_absolute(3, 40.0, 30.0);
    fixture.server.start_interactive_resize(None, Edges::empty());
    assert_eq!(
        fixture.server.seat.cursor.resize_edges,
        Edges::TOP | Edges::LEFT
    );
    fixture.server.stop_interactive();
}

/// The grab dies with its toplevel.
#[test]
fn unmap_cancels_grab() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");

    fixture.server.start_interactive_move(Some(t));
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Move);
    fixture.server.handle_toplevel_unmap(t);
    assert_eq!(fixture.server.seat.cursor.state, CursorState::Normal);
    assert_eq!(fixture.server.seat.cursor.grabbed_toplevel, None);
}

/// Press callbacks consume the key; releases dispatch but still reach the
/// client.
#[test]
fn keybind_press_release_pairing() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);

    let presses = Rc::new(RefCell::new(0));
    let releases = Rc::new(RefCell::new(0));
    let p = presses.clone();
    let r = releases.clone();
    fixture.server.keybind_kbd_register(
        Modifiers::LOGO,
        Keysym::_1,
        KeybindInfo {
            on_press: Some(Rc::new(move |_| *p.borrow_mut() += 1)),
            on_release: Some(Rc::new(move |_| *r.borrow_mut() += 1)),
            group: None,
            description: None,
        },
    );

    fixture.drain_requests();
    key(&mut fixture, Keysym::_1, Modifiers::LOGO, true);
    assert_eq!((*presses.borrow(), *releases.borrow()), (1, 0));
    let requests = fixture.drain_requests();
    assert!(
        !requests
            .iter()
            .any(|r| matches!(r, ShellRequest::ForwardKey { pressed: true, .. })),
        "consumed press must not reach the client"
    );

    key(&mut fixture, Keysym::_1, Modifiers::LOGO, false);
    assert_eq!((*presses.borrow(), *releases.borrow()), (1, 1));
    let requests = fixture.drain_requests();
    assert!(
        requests
            .iter()
            .any(|r| matches!(r, ShellRequest::ForwardKey { pressed: false, .. })),
        "release always reaches the client"
    );

    // unbound keys forward unchanged
    key(&mut fixture, Keysym::_2, Modifiers::LOGO, true);
    let requests = fixture.drain_requests();
    assert!(requests
        .iter()
        .any(|r| matches!(r, ShellRequest::ForwardKey { pressed: true, .. })));
}

/// Ctrl+Alt+F1..F12 switch VTs, and survive a bind table clear.
#[test]
fn vt_switch_binds() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);

    fixture.drain_requests();
    key(
        &mut fixture,
        Keysym::F3,
        Modifiers::CTRL | Modifiers::ALT,
        true,
    );
    assert!(fixture
        .drain_requests()
        .iter()
        .any(|r| matches!(r, ShellRequest::SwitchVt { vt: 3 })));

    fixture.server.keybind_kbd_clear(false);
    key(
        &mut fixture,
        Keysym::F12,
        Modifiers::CTRL | Modifiers::ALT,
        true,
    );
    assert!(fixture
        .drain_requests()
        .iter()
        .any(|r| matches!(r, ShellRequest::SwitchVt { vt: 12 })));

    // explicit clear drops them too
    fixture.server.keybind_kbd_clear(true);
    key(
        &mut fixture,
        Keysym::F1,
        Modifiers::CTRL | Modifiers::ALT,
        true,
    );
    assert!(!fixture
        .drain_requests()
        .iter()
        .any(|r| matches!(r, ShellRequest::SwitchVt { .. })));
}

/// While locked, bindings stay quiet, keys route to the
/// lock surface, and unlock refocuses the newest visible toplevel.
#[test]
fn session_lock_exclusivity() {
    use tessella::input::FocusTarget;

    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    fixture.server.focus_toplevel(Some(a), false);
    fixture.server.focus_toplevel(Some(b), false);

    let fired = Rc::new(RefCell::new(false));
    let f = fired.clone();
    fixture.server.keybind_kbd_register(
        Modifiers::LOGO,
        Keysym::Return,
        KeybindInfo::press(Rc::new(move |_| *f.borrow_mut() = true)),
    );

    assert!(fixture.server.handle_new_lock());
    fixture.server.handle_lock_new_surface(output);
    assert!(fixture.server.session_lock.locked);
    assert_eq!(fixture.server.seat.keyboard_focus, Some(FocusTarget::Lock));

    fixture.drain_requests();
    key(&mut fixture, Keysym::Return, Modifiers::LOGO, true);
    assert!(!*fired.borrow(), "bindings must not fire while locked");
    assert!(
        fixture
            .drain_requests()
            .iter()
            .any(|r| matches!(r, ShellRequest::ForwardKey { pressed: true, .. })),
        "keystrokes route to the lock surface"
    );

    // focus changes cannot escape the lock, though the stack still reorders
    fixture.server.focus_toplevel(Some(a), false);
    assert_eq!(fixture.server.seat.keyboard_focus, Some(FocusTarget::Lock));

    // a second lock is refused
    assert!(!fixture.server.handle_new_lock());

    fixture.server.handle_unlock();
    assert!(!fixture.server.session_lock.locked);
    // the focus attempt above made `a` the newest focus candidate
    assert_eq!(
        fixture.server.seat.keyboard_focus,
        Some(FocusTarget::Toplevel(a))
    );

    key(&mut fixture, Keysym::Return, Modifiers::LOGO, true);
    assert!(*fired.borrow());
}

/// A locked pointer constraint swallows motion on its surface.
#[test]
fn locked_constraint_drops_motion() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("game");
    let c = fixture.container_of(t);
    fixture.server.container_set_position(c, 0, 0);

    // land the pointer on the surface first
    fixture.server.handle_pointer_motion_absolute(1, 320.0, 240.0);
    fixture
        .server
        .handle_new_pointer_constraint(t, ConstraintKind::Locked, Region::default());

    fixture.server.handle_pointer_motion(2, 50.0, 50.0);
    let cursor = &fixture.server.seat.cursor;
    assert_eq!((cursor.x, cursor.y), (320.0, 240.0));
}

/// A confined constraint clips motion into its region.
#[test]
fn confined_constraint_clips_motion() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("game");
    let c = fixture.container_of(t);
    fixture.server.container_set_position(c, 0, 0);

    fixture.server.handle_pointer_motion_absolute(1, 100.0, 100.0);
    fixture.server.handle_new_pointer_constraint(
        t,
        ConstraintKind::Confined,
        Region(vec![Rect::new(0, 0, 200, 200)]),
    );

    fixture.server.handle_pointer_motion(2, 500.0, 10.0);
    let cursor = &fixture.server.seat.cursor;
    assert_eq!(cursor.x, 199.0);
    assert_eq!(cursor.y, 110.0);
}

/// Mouse bindings consume the press but releases pass through.
#[test]
fn mouse_binding_consumes_press() {
    const BTN_LEFT: u32 = 0x110;

    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let hits = Rc::new(RefCell::new(0));
    let h = hits.clone();
    fixture.server.keybind_mouse_register(
        Modifiers::LOGO,
        BTN_LEFT,
        KeybindInfo::press(Rc::new(move |_| *h.borrow_mut() += 1)),
    );

    fixture.server.handle_modifiers(Modifiers::LOGO);
    fixture.drain_requests();
    fixture.server.handle_pointer_button(1, BTN_LEFT, true);
    assert_eq!(*hits.borrow(), 1);
    assert!(!fixture
        .drain_requests()
        .iter()
        .any(|r| matches!(r, ShellRequest::ForwardButton { pressed: true, .. })));

    fixture.server.handle_pointer_button(2, BTN_LEFT, false);
    assert!(fixture
        .drain_requests()
        .iter()
        .any(|r| matches!(r, ShellRequest::ForwardButton { pressed: false, .. })));
}

/// Clicking a toplevel focuses it and reorders the focus stack.
#[test]
fn click_to_focus() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let ca = fixture.container_of(a);
    let cb = fixture.container_of(b);
    fixture.server.container_set_position(ca, 0, 0);
    fixture.server.container_set_position(cb, 1000, 0);

    fixture.server.handle_pointer_motion_absolute(1, 50.0, 50.0);
    fixture.server.handle_pointer_button(2, 0x110, true);
    assert_eq!(fixture.server.focused_toplevel(), Some(a));
    assert_eq!(
        fixture.server.output(output).unwrap().state.focus_stack[0],
        ca
    );

    fixture.server.handle_pointer_motion_absolute(3, 1050.0, 50.0);
    fixture.server.handle_pointer_button(4, 0x110, true);
    assert_eq!(fixture.server.focused_toplevel(), Some(b));
}

/// Signals fire for focus churn in mapped order.
#[test]
fn focus_signals() {
    use tessella::signal::SignalArgs;

    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");

    let log: Rc<RefCell<Vec<(String, Option<ToplevelId>)>>> = Rc::new(RefCell::new(Vec::new()));
    for name in ["client::focus", "client::unfocus"] {
        let log = log.clone();
        fixture.server.signals.connect(
            name,
            Rc::new(move |_server: &mut tessella::Server, args: &SignalArgs| {
                log.borrow_mut().push((name.to_string(), args.toplevel()));
            }),
        );
    }

    fixture.server.focus_toplevel(Some(a), false);
    fixture.server.focus_toplevel(Some(b), false);

    let log = log.borrow();
    assert_eq!(log[0], ("client::focus".to_string(), Some(a)));
    assert_eq!(log[1], ("client::unfocus".to_string(), Some(a)));
    assert_eq!(log[2], ("client::focus".to_string(), Some(b)));
}
