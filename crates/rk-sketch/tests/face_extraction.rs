use glam::Vec2;
use proptest::prelude::*;
use rk_sketch::{Sketch, SketchPlane, SketchSettings};

fn sketch() -> Sketch {
    Sketch::new("Sketch", SketchPlane::xy(), SketchSettings::new())
}

fn add_polyline(sketch: &mut Sketch, points: &[(f32, f32)], closed: bool) {
    let n = points.len();
    let count = if closed { n } else { n - 1 };
    for i in 0..count {
        let (a, b) = (points[i], points[(i + 1) % n]);
        sketch
            .add_edge(Vec2::new(a.0, a.1), Vec2::new(b.0, b.1), false)
            .unwrap();
    }
}

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> [(f32, f32); 4] {
    [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
}

#[test]
fn square_gives_one_face() {
    let mut s = sketch();
    add_polyline(&mut s, &rect(0.0, 0.0, 10.0, 10.0), true);
    assert_eq!(s.faces().len(), 1);
    let face = &s.faces()[0];
    assert!((face.area - 100.0).abs() < 1e-4);
    assert_eq!(face.boundary().len(), 5);
    assert_eq!(face.boundary().first(), face.boundary().last());
}

#[test]
fn open_triangle_gives_no_face() {
    let mut s = sketch();
    add_polyline(&mut s, &[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0), (0.5, 0.5)], false);
    assert!(s.faces().is_empty());
    assert_eq!(s.edges().len(), 3);
}

#[test]
fn bridge_between_loops_is_kept_but_unused() {
    let mut s = sketch();
    add_polyline(&mut s, &rect(0.0, 0.0, 10.0, 10.0), true);
    add_polyline(&mut s, &rect(30.0, 0.0, 40.0, 10.0), true);
    add_polyline(&mut s, &[(10.0, 10.0), (30.0, 10.0)], false);

    assert_eq!(s.edges().len(), 9);
    assert_eq!(s.faces().len(), 2);
    let bridge = s
        .edges()
        .iter()
        .position(|e| {
            let a = s.nodes()[e.node_a].pos;
            let b = s.nodes()[e.node_b.unwrap()].pos;
            a == Vec2::new(10.0, 10.0) && b == Vec2::new(30.0, 10.0)
        })
        .unwrap();
    assert!(s.faces().iter().all(|f| !f.uses_edge(bridge)));
}

#[test]
fn bridge_into_nested_loop_gives_face_with_hole() {
    let mut s = sketch();
    add_polyline(&mut s, &rect(0.0, 0.0, 20.0, 20.0), true);
    add_polyline(&mut s, &rect(5.0, 5.0, 15.0, 15.0), true);
    add_polyline(&mut s, &[(0.0, 0.0), (5.0, 5.0)], false);

    assert_eq!(s.faces().len(), 2);
    let outer = &s.faces()[0];
    assert_eq!(outer.holes, vec![1]);
    assert!((outer.net_area - 300.0).abs() < 1e-3);
}

#[test]
fn dangling_tree_is_ignored() {
    let mut s = sketch();
    add_polyline(&mut s, &rect(0.0, 0.0, 100.0, 100.0), true);
    add_polyline(&mut s, &[(100.0, 100.0), (120.0, 120.0), (140.0, 120.0)], false);
    add_polyline(&mut s, &[(120.0, 120.0), (120.0, 140.0)], false);
    add_polyline(&mut s, &[(0.0, 0.0), (-10.0, 0.0)], false);
    assert_eq!(s.edges().len(), 8);
    assert_eq!(s.faces().len(), 1);
    assert!((s.faces()[0].area - 10000.0).abs() < 1e-2);
}

#[test]
fn grid_cells_are_separate_faces() {
    let mut s = sketch();
    for i in 0..3 {
        for j in 0..2 {
            let (x, y) = (i as f32 * 4.0, j as f32 * 4.0);
            add_polyline(&mut s, &rect(x, y, x + 4.0, y + 4.0), true);
        }
    }
    // Shared sides are stored once
    assert_eq!(s.edges().len(), 17);
    assert_eq!(s.faces().len(), 6);
    for face in s.faces() {
        assert!((face.area - 16.0).abs() < 1e-4);
        assert!(face.is_top_level());
    }
}

/// Whether a closed ring visits `expected` in order, starting anywhere
fn same_ring_up_to_rotation(ring: &[Vec2], expected: &[Vec2]) -> bool {
    let Some((_, open)) = ring.split_last() else {
        return expected.is_empty();
    };
    let n = open.len();
    n == expected.len() && (0..n).any(|k| (0..n).all(|i| open[(i + k) % n] == expected[i]))
}

fn add_circle(sketch: &mut Sketch, r: f32) {
    sketch
        .add_arc(Vec2::new(-r, 0.0), Vec2::new(0.0, -r), Vec2::new(r, 0.0))
        .unwrap();
    sketch
        .add_arc(Vec2::new(-r, 0.0), Vec2::new(0.0, r), Vec2::new(r, 0.0))
        .unwrap();
}

fn edge_order() -> impl Strategy<Value = (Vec<usize>, Vec<bool>)> {
    (
        Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        proptest::collection::vec(any::<bool>(), 4),
    )
}

proptest! {
    #[test]
    fn rectangle_face_ignores_edge_order_and_direction(
        x in -50i16..50,
        y in -50i16..50,
        w in 1u8..40,
        h in 1u8..40,
        (order, flip) in edge_order(),
    ) {
        let corners = rect(x as f32, y as f32, x as f32 + w as f32, y as f32 + h as f32);
        let mut s = sketch();
        for (&i, &reversed) in order.iter().zip(&flip) {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            let (a, b) = if reversed { (b, a) } else { (a, b) };
            s.add_edge(Vec2::new(a.0, a.1), Vec2::new(b.0, b.1), false).unwrap();
        }

        prop_assert_eq!(s.faces().len(), 1);
        let expected = w as f32 * h as f32;
        prop_assert!((s.faces()[0].area - expected).abs() <= expected * 1e-4);
        prop_assert!(rk_sketch::kernel::signed_area(s.faces()[0].boundary()) > 0.0);
        let reference: Vec<Vec2> = corners.iter().map(|(x, y)| Vec2::new(*x, *y)).collect();
        prop_assert!(same_ring_up_to_rotation(s.faces()[0].boundary(), &reference));
    }

    #[test]
    fn dangling_chain_never_adds_faces(
        w in 2u8..30,
        h in 2u8..30,
        steps in proptest::collection::vec((1u8..10, 0u8..10), 1..6),
    ) {
        let mut s = sketch();
        add_polyline(&mut s, &rect(0.0, 0.0, w as f32, h as f32), true);

        // A chain heading away from the rectangle into negative x and y
        let mut chain = vec![(0.0f32, 0.0f32)];
        for (dx, dy) in &steps {
            let (px, py) = chain[chain.len() - 1];
            chain.push((px - *dx as f32, py - *dy as f32));
        }
        add_polyline(&mut s, &chain, false);

        prop_assert_eq!(s.edges().len(), 4 + steps.len());
        prop_assert_eq!(s.faces().len(), 1);
        prop_assert!((s.faces()[0].area - w as f32 * h as f32).abs() < 1e-3);
    }

    #[test]
    fn rebuilding_faces_is_idempotent(
        levels in 2usize..5,
        gap in 2u8..5,
        radius in 1u8..6,
        with_circle in any::<bool>(),
        neighbours in 0usize..3,
    ) {
        let mut s = sketch();
        // Concentric squares around the origin, optionally a circle in the middle
        for i in 0..levels {
            let half = 20.0 - i as f32 * gap as f32;
            add_polyline(&mut s, &rect(-half, -half, half, half), true);
        }
        if with_circle {
            add_circle(&mut s, radius as f32);
        }
        for i in 0..neighbours {
            let x = 30.0 + i as f32 * 10.0;
            add_polyline(&mut s, &rect(x, 0.0, x + 5.0, 5.0), true);
        }

        let before = s.faces().to_vec();
        s.update_faces();
        let after = s.faces();

        prop_assert_eq!(before.len(), levels + with_circle as usize + neighbours);
        let deepest = before.iter().map(|f| f.depth).max().unwrap_or(0) as usize;
        prop_assert_eq!(deepest, levels - 1 + with_circle as usize);
        prop_assert_eq!(after.len(), before.len());
        for (a, b) in after.iter().zip(&before) {
            prop_assert_eq!(a.parent, b.parent);
            prop_assert_eq!(&a.holes, &b.holes);
            prop_assert_eq!(&a.region.holes, &b.region.holes);
        }
        prop_assert_eq!(after, before.as_slice());
    }
}
