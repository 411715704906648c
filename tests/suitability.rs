//! Tests of the route suitability of lanes near branches.

use assert_approx_eq::assert_approx_eq;
use ots_lane::{
    suitability, GtuTypeId, LaneAttributes, LaneId, LaneType, LinkType, Network, NetworkError,
    NodeId, Route, RouteNavigator, GET_OFF_THIS_LANE_NOW, NO_LANE_CHANGE_NEEDED,
};
use std::rc::Rc;

fn navigator(nodes: &[NodeId]) -> RouteNavigator {
    RouteNavigator::new(Rc::new(Route::new(nodes.to_vec()).unwrap()))
}

fn add_lanes(net: &mut Network, link: ots_lane::LinkId, n: usize, length: f64) -> Vec<LaneId> {
    let lanes: Vec<_> = (0..n)
        .map(|_| net.add_lane(link, &LaneAttributes::new(length, 25.0)))
        .collect();
    for pair in lanes.windows(2) {
        net.set_adjacent(pair[0], pair[1]);
    }
    lanes
}

/// A five lane approach to a node with three outgoing links. Only the two right lanes
/// lead onto the second link, which loops back to the start of the approach.
struct Branch {
    net: Network,
    car: GtuTypeId,
    nodes: [NodeId; 5],
    approach: Vec<LaneId>,
}

fn branch() -> Branch {
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let nodes = ["o", "n", "x1", "x2", "x3"].map(|name| net.add_node(name));
    let [o, n, x1, x2, x3] = nodes;

    let approach_link = net.add_link(o, n, LinkType::Ordinary);
    let approach = add_lanes(&mut net, approach_link, 5, 1000.0);
    let link1 = net.add_link(n, x1, LinkType::Ordinary);
    let lanes1 = add_lanes(&mut net, link1, 3, 500.0);
    let link2 = net.add_link(n, x2, LinkType::Ordinary);
    let lanes2 = add_lanes(&mut net, link2, 2, 200.0);
    let link3 = net.add_link(n, x3, LinkType::Ordinary);
    let lanes3 = add_lanes(&mut net, link3, 1, 500.0);
    let back_link = net.add_link(x2, o, LinkType::Ordinary);
    let back = add_lanes(&mut net, back_link, 2, 200.0);

    for i in 0..3 {
        net.connect_lanes(approach[i], lanes1[i]);
    }
    net.connect_lanes(approach[3], lanes2[0]);
    net.connect_lanes(approach[4], lanes2[1]);
    net.connect_lanes(approach[4], lanes3[0]);
    for i in 0..2 {
        net.connect_lanes(lanes2[i], back[i]);
        net.connect_lanes(back[i], approach[3 + i]);
    }

    Branch {
        net,
        car,
        nodes,
        approach,
    }
}

#[test]
fn lanes_leading_onto_the_route_are_preferred() {
    let Branch {
        net,
        car,
        nodes: [o, n, x1, x2, _],
        approach,
    } = branch();
    // Around the loop once, then off to x1
    let nav = navigator(&[o, n, x2, o, n, x1]);

    let values: Vec<f64> = approach
        .iter()
        .map(|lane| suitability(&net, &nav, car, *lane, 0.0, 90.0).unwrap())
        .collect();
    assert_eq!(values[3], NO_LANE_CHANGE_NEEDED);
    assert_eq!(values[4], NO_LANE_CHANGE_NEEDED);
    for value in &values[..3] {
        assert!(*value < values[3]);
    }
    // One, two and three lane changes away from the right lanes
    assert_approx_eq!(values[2], 1000.0);
    assert_approx_eq!(values[1], 1000.0 * 2.0 / 3.0);
    assert_approx_eq!(values[0], 1000.0 / 3.0);
}

#[test]
fn second_pass_through_a_branch_is_scored() {
    let Branch {
        net,
        car,
        nodes: [o, n, x1, x2, _],
        approach,
    } = branch();
    let nav = navigator(&[o, n, x2, o, n, x1]);

    // The second visit of n is 96 s ahead, where the right lanes must be left for x1
    let values: Vec<f64> = approach
        .iter()
        .map(|lane| suitability(&net, &nav, car, *lane, 0.0, 200.0).unwrap())
        .collect();
    assert_approx_eq!(values[3], 2400.0);
    assert_approx_eq!(values[4], 1700.0);
    assert_approx_eq!(values[2], 1000.0);
    assert_approx_eq!(values[1], 5000.0 / 7.0);
    assert_approx_eq!(values[0], 3000.0 / 7.0);
}

#[test]
fn suitability_decreases_with_urgency() {
    let Branch {
        net,
        car,
        nodes: [o, n, x1, x2, _],
        approach,
    } = branch();
    let nav = navigator(&[o, n, x2, o, n, x1]);
    let s = |lane: usize, position: f64| {
        suitability(&net, &nav, car, approach[lane], position, 90.0).unwrap()
    };

    // Less distance left
    assert!(s(2, 0.0) > s(2, 300.0));
    assert!(s(2, 300.0) > s(2, 600.0));
    assert!(s(1, 0.0) > s(1, 300.0));
    // More lane changes needed
    for position in [0.0, 300.0, 600.0] {
        assert!(s(2, position) > s(1, position));
        assert!(s(1, position) > s(0, position));
        assert!(s(0, position) > GET_OFF_THIS_LANE_NOW);
    }
}

#[test]
fn branch_beyond_the_horizon_is_ignored() {
    let Branch {
        net,
        car,
        nodes: [o, n, _, x2, _],
        approach,
    } = branch();
    let nav = navigator(&[o, n, x2]);
    // 40 s to the branch
    assert_eq!(
        suitability(&net, &nav, car, approach[0], 0.0, 30.0),
        Ok(NO_LANE_CHANGE_NEEDED)
    );
    assert!(suitability(&net, &nav, car, approach[0], 0.0, 50.0).unwrap() < 1000.0);
}

#[test]
fn single_compatible_lane_needs_no_change() {
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let truck = net.add_gtu_type("truck");
    let [o, n, x, y] = ["o", "n", "x", "y"].map(|name| net.add_node(name));

    let approach = net.add_link(o, n, LinkType::Ordinary);
    let left = net.add_lane(approach, &LaneAttributes::new(500.0, 25.0));
    let right = net.add_lane(
        approach,
        &LaneAttributes {
            lane_type: LaneType::only([truck]),
            ..LaneAttributes::new(500.0, 25.0)
        },
    );
    net.set_adjacent(left, right);
    // Two parallel links to x would make the route ambiguous
    for _ in 0..2 {
        let link = net.add_link(n, x, LinkType::Ordinary);
        let lane = net.add_lane(link, &LaneAttributes::new(500.0, 25.0));
        net.connect_lanes(right, lane);
    }
    let other = net.add_link(n, y, LinkType::Ordinary);
    let lane = net.add_lane(other, &LaneAttributes::new(500.0, 25.0));
    net.connect_lanes(left, lane);

    let nav = navigator(&[o, n, x]);
    assert_eq!(
        suitability(&net, &nav, car, left, 0.0, 90.0),
        Ok(NO_LANE_CHANGE_NEEDED)
    );
    assert_eq!(
        suitability(&net, &nav, truck, right, 0.0, 90.0),
        Err(NetworkError::AmbiguousRoute { node: n, next: x })
    );
}

#[test]
fn topology_errors_are_reported() {
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let [o, n, m, x] = ["o", "n", "m", "x"].map(|name| net.add_node(name));
    let approach = net.add_link(o, n, LinkType::Ordinary);
    let lanes = add_lanes(&mut net, approach, 2, 500.0);
    let through = net.add_link(n, m, LinkType::Ordinary);
    add_lanes(&mut net, through, 2, 500.0);
    let exit = net.add_link(m, x, LinkType::Ordinary);
    add_lanes(&mut net, exit, 2, 500.0);

    // Neither lane continues past n
    let nav = navigator(&[o, n, m, x]);
    assert_eq!(
        suitability(&net, &nav, car, lanes[0], 0.0, 90.0),
        Err(NetworkError::LaneEnds { lane: lanes[0] })
    );

    // A branch where no lane leads onto the route
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let [o, n, x, y] = ["o", "n", "x", "y"].map(|name| net.add_node(name));
    let approach = net.add_link(o, n, LinkType::Ordinary);
    let lanes = add_lanes(&mut net, approach, 2, 500.0);
    let to_x = net.add_link(n, x, LinkType::Ordinary);
    add_lanes(&mut net, to_x, 1, 500.0);
    let to_y = net.add_link(n, y, LinkType::Ordinary);
    let y_lanes = add_lanes(&mut net, to_y, 1, 500.0);
    net.connect_lanes(lanes[0], y_lanes[0]);
    net.connect_lanes(lanes[1], y_lanes[0]);

    let nav = navigator(&[o, n, x]);
    assert_eq!(
        suitability(&net, &nav, car, lanes[0], 0.0, 90.0),
        Err(NetworkError::NoConnectingLane {
            from: approach,
            to: to_x
        })
    );
    // The branch node is not on the route
    let nav = navigator(&[y]);
    assert_eq!(
        suitability(&net, &nav, car, lanes[0], 0.0, 90.0),
        Err(NetworkError::NotOnRoute { node: n })
    );
}

#[test]
fn dropped_lane_continues_on_the_right() {
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let [o, m, n, x, y] = ["o", "m", "n", "x", "y"].map(|name| net.add_node(name));
    let approach = net.add_link(o, m, LinkType::Ordinary);
    let lanes = add_lanes(&mut net, approach, 3, 1000.0);
    let merge = net.add_link(m, n, LinkType::Ordinary);
    let merged = add_lanes(&mut net, merge, 2, 500.0);
    let to_x = net.add_link(n, x, LinkType::Ordinary);
    let x_lanes = add_lanes(&mut net, to_x, 1, 500.0);
    let to_y = net.add_link(n, y, LinkType::Ordinary);
    let y_lanes = add_lanes(&mut net, to_y, 1, 500.0);

    // The middle lane ends at m
    net.connect_lanes(lanes[0], merged[0]);
    net.connect_lanes(lanes[2], merged[1]);
    net.connect_lanes(merged[0], x_lanes[0]);
    net.connect_lanes(merged[1], y_lanes[0]);

    // Continuing on the right leads to y, and away from x
    let to_y = navigator(&[o, m, n, y]);
    assert_eq!(
        suitability(&net, &to_y, car, lanes[1], 0.0, 90.0),
        Ok(NO_LANE_CHANGE_NEEDED)
    );
    let to_x = navigator(&[o, m, n, x]);
    let middle = suitability(&net, &to_x, car, lanes[1], 0.0, 90.0).unwrap();
    assert_approx_eq!(middle, 1500.0);
    assert_approx_eq!(
        suitability(&net, &to_x, car, lanes[2], 0.0, 90.0).unwrap(),
        middle
    );
}
