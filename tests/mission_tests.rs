// tests/mission_tests.rs
// End-to-end missions against the simulated world.

use gridflight::navigation::{NodeKind, build};
use gridflight::sim::{LuminanceDepth, SimWorld, SimulationConfig};
use gridflight::{
    Arena, ArenaConfig, DepthGate, GridflightConfig, Graph, MissionOutcome, MissionState,
    NavError, NavigationConfig, Navigator, RegionOfInterest, Vehicle, VehicleError, run_mission,
};
use nalgebra::Point2;
use rstest::rstest;

/// 2 x 1 arena flown from (0, 0) to (2, 0).
fn strip_mission() -> GridflightConfig {
    GridflightConfig {
        arena: ArenaConfig {
            width: 2.0,
            height: 1.0,
            spacing: 1.0,
            destination: [2.0, 0.0],
        },
        ..GridflightConfig::default()
    }
}

fn fly(config: GridflightConfig, world: &SimWorld) -> MissionOutcome {
    let mut vehicle = world.vehicle();
    let mut camera = world.camera();
    run_mission(config, &mut vehicle, &mut camera, LuminanceDepth)
}

fn flight_log(outcome: MissionOutcome) -> gridflight::FlightLog {
    match outcome {
        MissionOutcome::Arrived(log) => log,
        other => panic!("expected arrival, got {other:?}"),
    }
}

#[test]
fn clear_arena_arrives_in_two_legs() {
    let world = SimWorld::new(Point2::new(0.0, 0.0));
    let log = flight_log(fly(strip_mission(), &world));

    assert_eq!(log.legs_flown, 2);
    assert_eq!(log.visited, vec![0, 2, 4]);
    assert_eq!(log.replans, 0);
    assert_eq!(world.position(), Point2::new(2.0, 0.0));
    assert!(!world.airborne());
    assert_eq!(
        world.commands(),
        vec![
            "connect",
            "takeoff",
            "face (1.00, 0.00)",
            "move (1.00, 0.00)",
            "face (2.00, 0.00)",
            "move (2.00, 0.00)",
            "land",
            "disconnect",
        ]
    );
}

#[test]
fn obstacle_on_first_leg_forces_a_detour() {
    let world = SimWorld::new(Point2::new(0.0, 0.0)).with_obstacle([0.5, 0.0], 0.1);
    let log = flight_log(fly(strip_mission(), &world));

    assert_eq!(log.removed_edges, vec![(0, 2)]);
    assert_eq!(log.replans, 1);
    assert_eq!(log.paths, vec![vec![0, 2, 4], vec![0, 6, 2, 4]]);
    assert_eq!(log.visited, vec![0, 6, 2, 4]);
    assert_eq!(log.clearances.iter().filter(|c| !c.is_clear()).count(), 1);
    assert_eq!(world.collisions(), 0);
    assert_eq!(world.position(), Point2::new(2.0, 0.0));
    assert!(log.states.contains(&MissionState::Replanning));
}

#[test]
fn walled_off_destination_aborts_unreachable() {
    let world = SimWorld::new(Point2::new(0.0, 0.0)).with_obstacle([2.0, 0.0], 0.3);
    let outcome = fly(strip_mission(), &world);

    assert!(
        matches!(outcome, MissionOutcome::Aborted(NavError::Unreachable { goal: 4, .. })),
        "got {outcome:?}"
    );
    assert_eq!(world.collisions(), 0);
    assert!(!world.airborne(), "vehicle must be told to land");
    assert_eq!(world.commands().last().map(String::as_str), Some("disconnect"));
}

#[test]
fn hand_built_graph_without_a_bridge_is_unreachable() {
    // Two islands: {0, 1} around the start and {2, 3} around the destination.
    let mut graph = Graph::empty(1.0);
    let a = graph.insert_node(Point2::new(0.0, 0.0), NodeKind::Corner);
    let b = graph.insert_node(Point2::new(1.0, 0.0), NodeKind::Corner);
    let c = graph.insert_node(Point2::new(3.0, 0.0), NodeKind::Corner);
    let d = graph.insert_node(Point2::new(4.0, 0.0), NodeKind::Corner);
    graph.connect(a, b).unwrap();
    graph.connect(c, d).unwrap();
    graph.set_destination(d).unwrap();

    let gate = DepthGate::new(LuminanceDepth, RegionOfInterest::default(), 0.3, false).unwrap();
    let mut navigator = Navigator::new(graph, gate, NavigationConfig::default());
    let world = SimWorld::new(Point2::new(0.0, 0.0));
    let mut vehicle = world.vehicle();
    let mut camera = world.camera();
    vehicle.connect().unwrap();

    let outcome = navigator.fly(&mut vehicle, &mut camera);
    assert!(matches!(
        outcome,
        MissionOutcome::Aborted(NavError::Unreachable { start: 0, goal: 3 })
    ));
    assert!(!world.commands().iter().any(|c| c == "takeoff"));
    assert_eq!(navigator.state(), MissionState::Aborted);
}

#[test]
fn dropped_frame_is_retried() {
    let world = SimWorld::from_config(&SimulationConfig {
        frame_dropouts: 1,
        ..SimulationConfig::default()
    });
    let log = flight_log(fly(strip_mission(), &world));
    assert_eq!(log.visited, vec![0, 2, 4]);
    assert!(log.removed_edges.is_empty());
}

#[test]
fn persistent_dropouts_block_legs_without_retries() {
    let world = SimWorld::new(Point2::new(0.0, 0.0));
    world.drop_frames(1);
    let mut config = strip_mission();
    config.navigation.capture_retries = 0;

    let log = flight_log(fly(config, &world));
    assert_eq!(log.removed_edges, vec![(0, 2)]);
    assert_eq!(log.visited, vec![0, 6, 2, 4]);
}

#[test]
fn timeout_mid_mission_lands_the_vehicle() {
    let world = SimWorld::new(Point2::new(0.0, 0.0));
    world.time_out_on_leg(1);
    let outcome = fly(strip_mission(), &world);

    assert!(matches!(
        outcome,
        MissionOutcome::Aborted(NavError::Vehicle(VehicleError::Timeout { .. }))
    ));
    assert!(!world.airborne());
    assert_eq!(world.position(), Point2::new(1.0, 0.0));
}

#[rstest]
#[case(0.0, 1.0, [2.0, 0.0])]
#[case(2.0, 1.0, [9.0, 9.0])]
#[case(2.0, 3.0, [2.0, 0.0])]
fn bad_configuration_never_commands_the_vehicle(
    #[case] width: f64,
    #[case] spacing: f64,
    #[case] destination: [f64; 2],
) {
    let mut config = strip_mission();
    config.arena.width = width;
    config.arena.spacing = spacing;
    config.arena.destination = destination;
    let world = SimWorld::new(Point2::new(0.0, 0.0));

    let outcome = fly(config, &world);
    match outcome {
        MissionOutcome::ConfigurationError(err) => assert!(err.is_preflight(), "{err}"),
        other => panic!("expected a configuration error, got {other:?}"),
    }
    assert!(world.commands().is_empty());
}

#[test]
fn cancelled_mission_stays_on_the_ground() {
    let config = strip_mission();
    let mut mission = gridflight::Gridflight::new(config, LuminanceDepth).unwrap();
    mission.abort_signal().trigger();
    let world = SimWorld::new(Point2::new(0.0, 0.0));

    let outcome = mission.fly(&mut world.vehicle(), &mut world.camera());
    assert!(matches!(outcome, MissionOutcome::Aborted(NavError::Cancelled)));
    assert_eq!(world.commands(), vec!["connect", "disconnect"]);
}

#[test]
fn bundled_mission_file_arrives() {
    let config = GridflightConfig::from_yaml_file("config/mission.yaml").unwrap();
    let world = SimWorld::from_config(config.simulation.as_ref().unwrap());
    let destination = config.destination();

    let log = flight_log(fly(config, &world));
    assert_eq!(world.position(), destination);
    assert_eq!(world.collisions(), 0);
    assert!(log.legs_flown >= 8);
}

#[test]
fn grid_helpers_agree_with_mission_builder() {
    let config = strip_mission();
    let mission = gridflight::Gridflight::new(config.clone(), LuminanceDepth).unwrap();
    let expected = build(
        &Arena::new(config.arena.width, config.arena.height).unwrap(),
        config.arena.spacing,
        config.destination(),
    )
    .unwrap();
    assert_eq!(mission.graph(), &expected);
}
