//! End-to-end scenarios over the public API: build a tree, resolve it with
//! the built-in geometry renderer, and check the resolved layout and reveal
//! behavior.

use easel::{pause, Block, PlainRenderer, PropId, Scene, Value};

fn leaf(side: f64) -> Block {
    let block = Block::rect(side, side);
    block.stroke_width(0.0);
    block
}

fn resolved(root: Block) -> Scene {
    let mut scene = Scene::new(root);
    let pending = scene.resolve(&mut PlainRenderer::new()).unwrap();
    assert!(pending.is_empty());
    scene
}

fn num(block: &Block, id: PropId) -> f64 {
    block.property(id).get_num().unwrap().unwrap()
}

#[test]
fn two_by_two_table_layout() {
    let rows = vec![vec![leaf(50.0), leaf(50.0)], vec![leaf(50.0), leaf(50.0)]];
    let table = Block::table(rows).unwrap();
    table.margin(5.0, 5.0).justify("l", "l");

    let scene = resolved(table);
    let table = scene.root();

    assert_eq!(num(table, PropId::RealWidth), 105.0);
    assert_eq!(num(table, PropId::RealHeight), 105.0);

    // Row-major wrappers; column offsets 0 and 55.
    let cells = table.children();
    assert_eq!(num(&cells[0], PropId::Left), 0.0);
    assert_eq!(num(&cells[1], PropId::Left), 55.0);
    assert_eq!(num(&cells[2], PropId::Top), 55.0);
}

#[test]
fn column_widths_sum_to_total_width() {
    // Mixed natural sizes; columns resolve to the widest member.
    let rows = vec![
        vec![leaf(10.0), leaf(40.0), leaf(25.0)],
        vec![leaf(30.0), leaf(20.0), leaf(25.0)],
    ];
    let table = Block::table(rows).unwrap();
    let margin = 7.0;
    table.margin(margin, margin);

    let scene = resolved(table);
    let table = scene.root();

    let widths = [30.0, 40.0, 25.0];
    let expected: f64 = widths.iter().sum::<f64>() + margin * (widths.len() - 1) as f64;
    assert_eq!(num(table, PropId::RealWidth), expected);

    // Each cell occupies its column's resolved width regardless of its own
    // natural size: successive columns start one resolved width + margin
    // apart.
    let cells = table.children();
    assert_eq!(num(&cells[1], PropId::Left), 30.0 + margin);
    assert_eq!(num(&cells[2], PropId::Left), 30.0 + margin + 40.0 + margin);
}

#[test]
fn center_transform_centers_arbitrary_content() {
    let content = Block::rect(123.0, 45.0);
    content.stroke_width(0.0);
    let centered = Block::center(&content).unwrap();

    let scene = resolved(centered);
    let root = scene.root();

    assert_eq!(num(root, PropId::XMiddle), 0.0);
    assert_eq!(num(root, PropId::YMiddle), 0.0);
    assert_eq!(num(root, PropId::RealWidth), 123.0);
}

#[test]
fn re_measuring_content_reflows_without_reconstruction() {
    let content = Block::rect(50.0, 50.0);
    content.stroke_width(0.0);
    let homed = Block::home(&content).unwrap();

    let mut scene = resolved(homed);
    assert_eq!(num(scene.root(), PropId::Right), 50.0);

    // Double the content and re-resolve; the pivot shift recomputes from
    // the same formulas.
    let content_handle = scene.root().children()[0].clone();
    content_handle.width(100.0).height(100.0);
    content_handle.invalidate_render();
    let pending = scene.resolve(&mut PlainRenderer::new()).unwrap();
    assert!(pending.is_empty());

    assert_eq!(num(scene.root(), PropId::Left), 0.0);
    assert_eq!(num(scene.root(), PropId::Right), 100.0);
}

#[test]
fn level_stepping_shows_and_hides_in_order() {
    let (a, b, c) = (leaf(10.0), leaf(10.0), leaf(10.0));
    let root = Block::overlay(vec![]).unwrap();
    root.add(&a).unwrap();
    root.add(pause()).unwrap();
    root.add(&b).unwrap();
    root.add(pause()).unwrap();
    root.add(&c).unwrap();

    let mut scene = resolved(root);
    assert_eq!(scene.max_level().unwrap(), 2);

    assert!(a.is_visible() && !b.is_visible() && !c.is_visible());

    scene.set_level(2).unwrap();
    assert!(a.is_visible() && b.is_visible() && c.is_visible());

    scene.set_level(0).unwrap();
    assert!(a.is_visible() && !b.is_visible() && !c.is_visible());
}

#[test]
fn pair_property_symmetry_through_a_block() {
    let block = leaf(10.0);
    block
        .set_property_pair(
            PropId::XMargin,
            PropId::YMargin,
            Some(Value::Num(3.0)),
            Some(Value::Num(9.0)),
        )
        .unwrap();
    assert_eq!(
        block.property(PropId::XMargin).get_num().unwrap(),
        Some(3.0)
    );
    assert_eq!(
        block.property(PropId::YMargin).get_num().unwrap(),
        Some(9.0)
    );

    // A single value through the composite name drives both cells.
    let v = Value::Num(4.0);
    block
        .set_property_pair(PropId::XMargin, PropId::YMargin, Some(v.clone()), Some(v))
        .unwrap();
    assert_eq!(
        block.property(PropId::XMargin).get_num().unwrap(),
        Some(4.0)
    );
    assert_eq!(
        block.property(PropId::YMargin).get_num().unwrap(),
        Some(4.0)
    );
}

#[test]
fn framed_table_resolves_as_one_tree() {
    let rows = vec![vec![leaf(20.0), leaf(20.0)]];
    let table = Block::table(rows).unwrap();
    table.margin(4.0, 0.0);
    let framed = Block::frame(&table).unwrap();
    framed.padding(6.0, 6.0);

    let scene = resolved(framed);
    let root = scene.root();

    // Table is 44 wide; background adds 2*(6 + 0.5) with its stroke of 1.
    assert_eq!(num(root, PropId::RealWidth), 44.0 + 13.0 + 1.0);
    assert_eq!(num(root, PropId::XMiddle), 0.0);
}
