use std::time::Instant;

use ots_lane::math::{Point2d, Polyline2d};
use ots_lane::{
    GtuAttributes, LaneAttributes, LinkType, Network, OdRouteGenerator, SimResult, Simulation,
    SimulationConfig, StandardPlannerFactory, VehicleGenerator,
};

const LANE_WIDTH: f64 = 3.5;

/// A three lane motorway with an off-ramp leaving from the right lane.
fn main() -> SimResult<()> {
    let mut net = Network::new();
    let car = net.add_gtu_type("car");
    let origin = net.add_node("origin");
    let split = net.add_node("split");
    let motorway_end = net.add_node("motorway end");
    let exit = net.add_node("exit");

    let before = net.add_link(origin, split, LinkType::Ordinary);
    let after = net.add_link(split, motorway_end, LinkType::Ordinary);
    let ramp = net.add_link(split, exit, LinkType::Ordinary);

    let straight = |x0: f64, x1: f64, lane: usize| LaneAttributes {
        centre_line: Some(Polyline2d::straight(
            Point2d::new(x0, -LANE_WIDTH * lane as f64),
            Point2d::new(x1, -LANE_WIDTH * lane as f64),
        )),
        ..LaneAttributes::new(x1 - x0, 120.0 / 3.6)
    };
    let before_lanes = [0, 1, 2].map(|i| net.add_lane(before, &straight(0.0, 2000.0, i)));
    let after_lanes = [0, 1, 2].map(|i| net.add_lane(after, &straight(2000.0, 3000.0, i)));
    for lanes in [before_lanes, after_lanes] {
        net.set_adjacent(lanes[0], lanes[1]);
        net.set_adjacent(lanes[1], lanes[2]);
    }
    for (from, to) in before_lanes.iter().zip(&after_lanes) {
        net.connect_lanes(*from, *to);
    }
    let ramp_lane = net.add_lane(
        ramp,
        &LaneAttributes {
            centre_line: Some(Polyline2d::new([
                Point2d::new(2000.0, -3.0 * LANE_WIDTH),
                Point2d::new(2200.0, -4.0 * LANE_WIDTH),
                Point2d::new(2500.0, -30.0),
            ])),
            ..LaneAttributes::new(500.0, 80.0 / 3.6)
        },
    );
    net.connect_lanes(before_lanes[2], ramp_lane);

    let mut sim = Simulation::new(net, SimulationConfig::default());
    for (i, lane) in before_lanes.into_iter().enumerate() {
        let routes = OdRouteGenerator::new(origin, [(motorway_end, 0.8), (exit, 0.2)])?;
        let factory = StandardPlannerFactory::new(routes).with_speed_factor_stddev(0.1)?;
        let attributes = GtuAttributes {
            gtu_type: car,
            length: 4.0,
            width: 1.8,
            max_speed: 180.0 / 3.6,
        };
        let generator = VehicleGenerator::new(lane, 3.0 + i as f64, attributes, factory)
            .with_initial_speed(25.0);
        sim.add_generator(generator)?;
    }

    println!("Simulating...");
    let start = Instant::now();
    let mut exited = 0;
    for minute in 1..=10 {
        sim.run_until(60.0 * minute as f64);
        let throughput = sim.exited_count() - exited;
        exited = sim.exited_count();
        let gtus: Vec<_> = sim.iter_gtus().collect();
        let mean_speed = gtus.iter().map(|gtu| gtu.speed()).sum::<f64>() / gtus.len().max(1) as f64;
        println!(
            "t = {:>4.0} s: {:>4} GTUs, mean speed {:>5.1} km/h, {:>4} veh/h exited",
            sim.time(),
            gtus.len(),
            3.6 * mean_speed,
            60 * throughput,
        );
    }
    println!("Done in {:?}", start.elapsed());
    Ok(())
}
