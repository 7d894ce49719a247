//! Layout engine tests: master/stack arithmetic and the BSP tree.

use insta::assert_snapshot;
use tessella::layout::LayoutMode;
use tessella::testing::Fixture;
use tessella::utils::Rect;

/// Three toplevels under the tile strategy split into one master column and
/// two stacked rows; the newest container takes the master slot.
#[test]
fn master_tile_three_toplevels() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let c = fixture.map_toplevel("c");

    assert_eq!(fixture.container_box_of(c), Rect::new(0, 0, 960, 1080));
    assert_eq!(fixture.container_box_of(b), Rect::new(960, 0, 960, 540));
    assert_eq!(fixture.container_box_of(a), Rect::new(960, 540, 960, 540));
}

/// Changing mwfact re-tiles: the master column takes the new share and the
/// stack absorbs the rest.
#[test]
fn master_tile_mwfact_change() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let c = fixture.map_toplevel("c");

    fixture.server.output_set_mwfact(output, 0, 0.6);

    assert_eq!(fixture.container_box_of(c), Rect::new(0, 0, 1152, 1080));
    assert_eq!(fixture.container_box_of(b), Rect::new(1152, 0, 768, 540));
    assert_eq!(fixture.container_box_of(a), Rect::new(1152, 540, 768, 540));
}

/// A single tileable toplevel fills the usable area.
#[test]
fn master_tile_single() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1280, 720);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);

    let a = fixture.map_toplevel("a");
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 1280, 720));
}

/// The last stack row absorbs integer-division remainders so the column
/// total equals the usable height.
#[test]
fn master_tile_rounding_remainder() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);

    let mut toplevels = Vec::new();
    for name in ["a", "b", "c", "d"] {
        toplevels.push(fixture.map_toplevel(name));
    }

    // three stack rows of 1080/3 = 360
    let boxes: Vec<Rect> = toplevels
        .iter()
        .map(|&t| fixture.container_box_of(t))
        .collect();
    let stack: i32 = boxes.iter().filter(|b| b.x == 960).map(|b| b.height).sum();
    assert_eq!(stack, 1080);
}

/// Monocle stacks every container on the full usable area.
#[test]
fn master_monocle() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");

    // tile -> monocle
    fixture.server.output_set_strategy_idx(output, 1);

    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 1920, 1080));
    assert_eq!(fixture.container_box_of(b), Rect::new(0, 0, 1920, 1080));
}

/// The strategy cursor is cyclic in both directions.
#[test]
fn master_strategy_cycle() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    fixture.map_toplevel("a");

    let strategy = |fixture: &Fixture| {
        fixture
            .server
            .output_current_view_info(output)
            .unwrap()
            .master
            .strategy
    };

    assert_eq!(strategy(&fixture), 0);
    fixture.server.output_set_strategy_idx(output, 1);
    assert_eq!(strategy(&fixture), 1);
    fixture.server.output_set_strategy_idx(output, 1);
    assert_eq!(strategy(&fixture), 0);
    fixture.server.output_set_strategy_idx(output, -1);
    assert_eq!(strategy(&fixture), 1);
}

/// Useless gaps offset positions; the container rectangle keeps the slot
/// size handed out by the strategy.
#[test]
fn master_tile_with_gaps() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1920, 1080);
    fixture.server.output_set_layout_mode(output, LayoutMode::Master);
    fixture.server.output_set_useless_gaps(output, 0, 10);

    let a = fixture.map_toplevel("a");
    let b = fixture.container_box_of(a);
    assert_eq!((b.x, b.y), (10, 10));
    assert_eq!((b.width, b.height), (1920, 1080));
}

/// Four BSP inserts into an empty 1600×900 workspace.
#[test]
fn bsp_insert_four() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let a = fixture.map_toplevel("a");
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 1600, 900));

    let b = fixture.map_toplevel("b");
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 800, 900));
    assert_eq!(fixture.container_box_of(b), Rect::new(800, 0, 800, 900));

    let c = fixture.map_toplevel("c");
    assert_eq!(fixture.container_box_of(b), Rect::new(800, 0, 800, 450));
    assert_eq!(fixture.container_box_of(c), Rect::new(800, 450, 800, 450));

    let d = fixture.map_toplevel("d");
    assert_eq!(fixture.container_box_of(c), Rect::new(800, 450, 400, 450));
    assert_eq!(fixture.container_box_of(d), Rect::new(1200, 450, 400, 450));
}

#[test]
fn bsp_tree_shape_snapshot() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);
    for name in ["a", "b", "c", "d"] {
        fixture.map_toplevel(name);
    }

    let workspace = fixture
        .server
        .output(output)
        .unwrap()
        .state
        .active_workspace;
    assert_snapshot!(fixture.server.bsp_dump(output, workspace), @r###"
    vertical 0.50 (0, 0, 1600, 900)
      leaf (0, 0, 800, 900)
      horizontal 0.50 (800, 0, 800, 900)
        leaf (800, 0, 800, 450)
        vertical 0.50 (800, 450, 800, 450)
          leaf (800, 450, 400, 450)
          leaf (1200, 450, 400, 450)
    "###);
}

/// insert(c); remove(c) restores the previous tree shape.
#[test]
fn bsp_insert_remove_round_trip() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let c = fixture.map_toplevel("c");
    let workspace = fixture
        .server
        .output(output)
        .unwrap()
        .state
        .active_workspace;
    let before = fixture.server.bsp_dump(output, workspace);

    let d = fixture.map_toplevel("d");
    fixture.server.handle_toplevel_unmap(d);
    fixture.server.handle_toplevel_destroy(d);

    let after = fixture.server.bsp_dump(output, workspace);
    assert_eq!(before, after);

    // and the earlier containers still hold their slots
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 800, 900));
    assert_eq!(fixture.container_box_of(b), Rect::new(800, 0, 800, 450));
    assert_eq!(fixture.container_box_of(c), Rect::new(800, 450, 800, 450));
}

/// Removing the last container empties the workspace tree.
#[test]
fn bsp_remove_root() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let a = fixture.map_toplevel("a");
    let workspace = fixture
        .server
        .output(output)
        .unwrap()
        .state
        .active_workspace;
    fixture.server.handle_toplevel_unmap(a);
    fixture.server.handle_toplevel_destroy(a);
    assert!(fixture.server.bsp_dump(output, workspace).is_empty());
}

/// A floating container leaves its BSP slot disabled; the sibling inherits
/// the whole area until it returns.
#[test]
fn bsp_disable_on_floating() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 800, 900));

    fixture.server.toplevel_set_floating(b, true);
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 1600, 900));

    fixture.server.toplevel_set_floating(b, false);
    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 800, 900));
    assert_eq!(fixture.container_box_of(b), Rect::new(800, 0, 800, 900));
}

/// toggle_split flips the parent split of a leaf.
#[test]
fn bsp_toggle_split() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    let node = fixture
        .server
        .container(fixture.container_of(b))
        .unwrap()
        .bsp_node
        .unwrap();
    fixture.server.bsp_toggle_split(node);

    assert_eq!(fixture.container_box_of(a), Rect::new(0, 0, 1600, 450));
    assert_eq!(fixture.container_box_of(b), Rect::new(0, 450, 1600, 450));
}

/// Switching a populated floating workspace to BSP adopts every tileable
/// container into the tree.
#[test]
fn bsp_adopts_existing_containers() {
    let mut fixture = Fixture::new();
    let output = fixture.add_output("Virtual-1", 1600, 900);

    let a = fixture.map_toplevel("a");
    let b = fixture.map_toplevel("b");
    fixture.server.output_set_layout_mode(output, LayoutMode::Bsp);

    let ca = fixture.container_of(a);
    let cb = fixture.container_of(b);
    assert!(fixture.server.container(ca).unwrap().bsp_node.is_some());
    assert!(fixture.server.container(cb).unwrap().bsp_node.is_some());
}
