//! Integration tests for the compositor core.
//!
//! These drive the same `Server` production uses through the test fixture's
//! synthetic wire events.

use tessella::container::ContainerState;
use tessella::layout::LayoutMode;
use tessella::shell::{ShellRequest, ToplevelDesc, ToplevelKind};
use tessella::testing::Fixture;
use tessella::utils::Rect;

/// Fullscreen and maximized are mutually exclusive, both ways.
#[test]
fn fullscreen_maximized_exclusive() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.toplevel_set_fullscreen(t, true);
    let state = fixture.server.container(c).unwrap().state;
    assert!(state.contains(ContainerState::FULLSCREEN));
    assert!(!state.contains(ContainerState::MAXIMIZED));

    fixture.server.toplevel_set_maximized(t, true);
    let state = fixture.server.container(c).unwrap().state;
    assert!(state.contains(ContainerState::MAXIMIZED));
    assert!(!state.contains(ContainerState::FULLSCREEN));
}

/// Fullscreen toggle preserves the floating rectangle.
#[test]
fn fullscreen_toggle_preserves_floating_rect() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.container_set_position(c, 100, 100);
    fixture.server.container_set_size(c, 640, 480);
    assert_eq!(fixture.container_box_of(t), Rect::new(100, 100, 640, 480));

    fixture.server.toplevel_set_fullscreen(t, true);
    let (width, height) = {
        let o = fixture.server.output(output).unwrap();
        (o.width, o.height)
    };
    assert_eq!(fixture.container_box_of(t), Rect::new(0, 0, width, height));

    fixture.server.toplevel_set_fullscreen(t, false);
    assert_eq!(fixture.container_box_of(t), Rect::new(100, 100, 640, 480));
}

/// Sticky containers stay visible on every view.
#[test]
fn sticky_survives_view_switch() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.toplevel_set_sticky(t, true);
    fixture.server.output_set_view_only(output, 5);
    assert!(fixture.server.container_is_visible(c));

    fixture.server.toplevel_set_sticky(t, false);
    assert!(!fixture.server.container_is_visible(c));
}

/// toggle_tag twice is the identity on active_tag.
#[test]
fn toggle_tag_twice_is_identity() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let before = fixture.server.output(output).unwrap().state.active_tag;

    fixture.server.output_toggle_tag(output, 4);
    let mid = fixture.server.output(output).unwrap().state.active_tag;
    assert_ne!(before, mid);
    fixture.server.output_toggle_tag(output, 4);
    let after = fixture.server.output(output).unwrap().state.active_tag;
    assert_eq!(before, after);
}

/// move_to_tag is idempotent through detours.
#[test]
fn move_to_tag_round_trip() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.toplevel_move_to_tag(t, 3);
    let direct = {
        let c = fixture.server.container(c).unwrap();
        (c.workspace, c.tag)
    };

    fixture.server.toplevel_move_to_tag(t, 7);
    fixture.server.toplevel_move_to_tag(t, 3);
    let detour = {
        let c = fixture.server.container(c).unwrap();
        (c.workspace, c.tag)
    };

    assert_eq!(direct, detour);
    assert_eq!(direct, (3, 1 << 2));
}

/// Toggling a tag unions the visible set without moving active_workspace.
#[test]
fn tag_union_view() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    fixture.server.output_set_view_only(output, 2);
    let b = fixture.map_toplevel("b");

    let ca = fixture.container_of(a);
    let cb = fixture.container_of(b);
    assert!(!fixture.server.container_is_visible(ca));
    assert!(fixture.server.container_is_visible(cb));

    fixture.server.output_toggle_tag(output, 1);
    assert!(fixture.server.container_is_visible(ca));
    assert!(fixture.server.container_is_visible(cb));
    assert_eq!(
        fixture.server.output(output).unwrap().state.active_workspace,
        2
    );
}

/// Unminimize snaps a container back to "here, now": the output's current
/// tag and workspace, not where it was minimized.
#[test]
fn unminimize_returns_to_current_view() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.toplevel_set_minimized(t, true);
    assert!(fixture
        .server
        .output(output)
        .unwrap()
        .state
        .minimized
        .contains(&c));

    fixture.server.output_set_view_only(output, 4);
    fixture.server.toplevel_set_minimized(t, false);

    let container = fixture.server.container(c).unwrap();
    assert_eq!(container.workspace, 4);
    assert_eq!(container.tag, 1 << 3);
    assert!(fixture.server.container_is_visible(c));
    assert!(!fixture
        .server
        .output(output)
        .unwrap()
        .state
        .minimized
        .contains(&c));
}

/// Focus stack: most recently focused first, each managed container at most
/// once, and membership mirrors the containers list.
#[test]
fn focus_stack_invariants() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let c = fixture.map_toplevel("c");

    fixture.server.focus_toplevel(Some(a), false);
    fixture.server.focus_toplevel(Some(c), false);
    fixture.server.focus_toplevel(Some(b), false);

    let state = &fixture.server.output(output).unwrap().state;
    let stack = &state.focus_stack;
    assert_eq!(stack[0], fixture.container_of(b));

    let mut sorted = stack.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), stack.len(), "focus stack has duplicates");
    for container in stack {
        assert!(state.containers.contains(container));
    }
}

/// set_floating(true); set_floating(false) puts the container back into the
/// tiled arrangement it would have had all along.
#[test]
fn floating_round_trip_restores_tiling() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");

    let before = (fixture.container_box_of(a), fixture.container_box_of(b));
    fixture.server.toplevel_set_floating(b, true);
    fixture.server.toplevel_set_floating(b, false);
    let after = (fixture.container_box_of(a), fixture.container_box_of(b));
    assert_eq!(before, after);
}

/// Hot-unplug parks the output state and a same-name
/// replug restores it.
#[test]
fn hot_unplug_replug_restores_state() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("HDMI-A-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.server.toplevel_move_to_tag(t, 3);
    fixture.server.output_set_view_only(output, 3);
    fixture.server.output_set_max_general_workspace(output, 12);

    fixture.server.handle_output_destroyed(output);
    assert!(fixture.server.output(output).is_none());

    let replugged = fixture.add_output("HDMI-A-1", 1920, 1080);
    let restored = fixture.server.output(replugged).unwrap();
    assert!(restored.restored);
    assert_eq!(restored.state.active_workspace, 3);
    assert_eq!(restored.state.max_general_workspace, 12);
    assert!(restored.state.containers.contains(&c));

    // the container was re-homed onto the new output
    let container = fixture.server.container(c).unwrap();
    assert_eq!(container.output, replugged);
    assert_eq!(container.workspace, 3);
    assert!(fixture.server.container_is_visible(c));
}

/// A fresh output with an unseen name starts from defaults.
#[test]
fn unknown_output_is_not_restored() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("HDMI-A-1", 1920, 1080);
    fixture.server.handle_output_destroyed(output);
    let other = fixture.add_output("DP-2", 1920, 1080);
    assert!(!fixture.server.output(other).unwrap().restored);
}

/// The insert mark adopts the next mapped toplevel into an existing
/// container instead of creating a new one.
#[test]
fn insert_marked_container_adopts_next_map() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let c = fixture.container_of(a);

    fixture.server.set_insert_marked(Some(c));
    let b = fixture.map_toplevel("b");
    assert_eq!(fixture.container_of(b), c);
    assert_eq!(fixture.server.container(c).unwrap().toplevels.len(), 2);
}

/// The insert mark is weak: it clears when its target dies.
#[test]
fn insert_marked_clears_on_destroy() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let c = fixture.container_of(a);

    fixture.server.set_insert_marked(Some(c));
    fixture.server.handle_toplevel_unmap(a);
    fixture.server.handle_toplevel_destroy(a);
    assert_eq!(fixture.server.insert_marked, None);

    let b = fixture.map_toplevel("b");
    assert_ne!(fixture.container_of(b), c);
}

/// container swap exchanges populations but not geometry or workspace.
#[test]
fn container_swap_keeps_identity() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let ca = fixture.container_of(a);
    let cb = fixture.container_of(b);

    fixture.server.container_set_position(ca, 50, 60);
    let box_a = fixture.server.container_box(ca);

    fixture.server.container_swap(ca, cb);

    assert_eq!(fixture.container_of(a), cb);
    assert_eq!(fixture.container_of(b), ca);
    // geometry stays with the container, not the toplevel
    assert_eq!(fixture.server.container_box(ca), box_a);
}

/// Cycling the front toplevel of a tabbed group wraps in both directions.
#[test]
fn focusidx_cycles() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let a = fixture.map_toplevel("a");
    let c = fixture.container_of(a);
    fixture.server.set_insert_marked(Some(c));
    let b = fixture.map_toplevel("b");

    // the adopted toplevel lands in front
    assert_eq!(fixture.server.container_front_toplevel(c), Some(b));
    fixture.server.container_focusidx(c, 1);
    assert_eq!(fixture.server.container_front_toplevel(c), Some(a));
    fixture.server.container_focusidx(c, 1);
    assert_eq!(fixture.server.container_front_toplevel(c), Some(b));
    fixture.server.container_focusidx(c, -1);
    assert_eq!(fixture.server.container_front_toplevel(c), Some(a));
    // zero is a no-op
    fixture.server.container_focusidx(c, 0);
    assert_eq!(fixture.server.container_front_toplevel(c), Some(a));
}

/// Surface sizes clamp up to the 20px hard minimum.
#[test]
fn min_size_clamp() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    let c = fixture.container_of(t);

    fixture.drain_requests();
    fixture.server.container_set_size(c, 4, 4);
    let clamped = fixture.drain_requests().into_iter().any(|r| {
        matches!(
            r,
            ShellRequest::Configure {
                width: 20,
                height: 20,
                ..
            }
        )
    });
    assert!(clamped);
}

/// Numeric writes clamp to their documented ranges.
#[test]
fn parameter_clamps() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);

    fixture.server.output_set_mwfact(output, 2, 0.01);
    fixture.server.output_set_useless_gaps(output, 2, -5);
    fixture.server.output_set_max_general_workspace(output, 99);

    let o = fixture.server.output(output).unwrap();
    assert_eq!(o.state.view_info[2].master.mwfact, 0.1);
    assert_eq!(o.state.view_info[2].useless_gaps, 0);
    assert_eq!(o.state.max_general_workspace, 30);

    fixture.server.output_set_mwfact(output, 2, 0.99);
    let o = fixture.server.output(output).unwrap();
    assert_eq!(o.state.view_info[2].master.mwfact, 0.9);
}

/// An unmanaged (override-redirect) toplevel never joins the managed lists.
#[test]
fn unmanaged_stays_out_of_management() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel_with(ToplevelDesc {
        kind: ToplevelKind::Legacy {
            override_redirect: true,
            modal: false,
        },
        app_id: "menu".to_string(),
        ..ToplevelDesc::default()
    });

    let c = fixture.container_of(t);
    assert!(fixture.server.container(c).unwrap().is_unmanaged());
    let state = &fixture.server.output(output).unwrap().state;
    assert!(!state.containers.contains(&c));
    assert!(!state.focus_stack.contains(&c));
    assert!(!state.toplevels.contains(&t));
}

/// Dialog-shaped toplevels (fixed size or parented) float and center.
#[test]
fn should_float_heuristic() {
    let mut fixture = Fixture::new();
    fixture.add_output("Virtual-1", 1920, 1080);
    let parent = fixture.map_toplevel("editor");
    let dialog = fixture.map_toplevel_with(ToplevelDesc {
        app_id: "dialog".to_string(),
        parent: Some(parent),
        ..ToplevelDesc::default()
    });

    let c = fixture.container_of(dialog);
    assert!(fixture
        .server
        .container(c)
        .unwrap()
        .state
        .contains(ContainerState::FLOATING));

    let fixed = fixture.map_toplevel_with(ToplevelDesc {
        app_id: "popup".to_string(),
        min_size: (300, 200),
        max_size: (300, 400),
        ..ToplevelDesc::default()
    });
    let c = fixture.container_of(fixed);
    assert!(fixture
        .server
        .container(c)
        .unwrap()
        .state
        .contains(ContainerState::FLOATING));
}

/// An exclusive layer surface shrinks the usable area and tiling follows;
/// unmapping gives the area back.
#[test]
fn layer_exclusive_zone_reshapes_tiling() {
    use tessella::shell::layer::{Anchor, KeyboardInteractivity, Layer, LayerSurfaceState};

    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    let t = fixture.map_toplevel("a");

    let bar = fixture
        .server
        .handle_new_layer_surface(Some(output), Layer::Top);
    fixture.server.handle_layer_commit(
        bar,
        Layer::Top,
        LayerSurfaceState {
            anchor: Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
            desired_size: (0, 30),
            exclusive_zone: 30,
            margin: (0, 0, 0, 0),
            keyboard_interactivity: KeyboardInteractivity::None,
        },
        true,
    );

    assert_eq!(
        fixture.server.output(output).unwrap().usable_area,
        Rect::new(0, 30, 1920, 1050)
    );
    assert_eq!(fixture.container_box_of(t), Rect::new(0, 30, 1920, 1050));

    fixture.server.handle_layer_destroy(bar);
    assert_eq!(
        fixture.server.output(output).unwrap().usable_area,
        Rect::new(0, 0, 1920, 1080)
    );
    assert_eq!(fixture.container_box_of(t), Rect::new(0, 0, 1920, 1080));
}

/// Maximized geometry follows usable-area changes.
#[test]
fn maximized_follows_usable_area() {
    use tessella::shell::layer::{Anchor, KeyboardInteractivity, Layer, LayerSurfaceState};

    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    let t = fixture.map_toplevel("a");
    fixture.server.toplevel_set_maximized(t, true);
    assert_eq!(fixture.container_box_of(t), Rect::new(0, 0, 1920, 1080));

    let bar = fixture
        .server
        .handle_new_layer_surface(Some(output), Layer::Bottom);
    fixture.server.handle_layer_commit(
        bar,
        Layer::Bottom,
        LayerSurfaceState {
            anchor: Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM,
            desired_size: (64, 0),
            exclusive_zone: 64,
            margin: (0, 0, 0, 0),
            keyboard_interactivity: KeyboardInteractivity::None,
        },
        true,
    );

    assert_eq!(
        fixture.server.output(output).unwrap().usable_area,
        Rect::new(64, 0, 1856, 1080)
    );
    assert_eq!(fixture.container_box_of(t), Rect::new(64, 0, 1856, 1080));
}
