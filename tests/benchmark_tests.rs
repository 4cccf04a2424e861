//! Performance benchmarks for the hot paths of a world session

use bincode::{deserialize, serialize};
use client::bus::{Bus, Signal};
use client::host::{Mesh, PointerEvent, RecordingHost};
use client::world::ClientWorld;
use server::respawn::RespawnScheduler;
use server::world::{ResourceFields, SceneConfig, WorldState};
use shared::resource::ResourceAction;
use shared::store::{ReplicatedStore, Role};
use shared::tool::{ToolAction, ToolState};
use shared::{ObjectAction, Packet, Request, Tuning};
use std::time::Instant;

/// Benchmarks authoritative store dispatch
#[test]
fn benchmark_store_dispatch() {
    let mut store = ReplicatedStore::<ToolState>::new(1, Role::Authority);
    store.dispatch(ToolAction::Hold {
        actor: 1,
        time: 0.0,
    });

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        store.dispatch(ToolAction::Use { time: i as f64 });
    }

    let duration = start.elapsed();
    println!(
        "Store dispatch: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(store.version(), iterations as u64 + 1);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks server-side validation and dispatch across many objects
#[test]
fn benchmark_world_dispatch() {
    let scene = SceneConfig {
        tools: 100,
        resources: 100,
        resource_fields: ResourceFields::default(),
    };
    let mut world = WorldState::from_scene(&scene);
    let tools = world.tool_ids();
    let resources = world.resource_ids();

    let start = Instant::now();
    let mut snapshots = 0;

    for (actor, tool) in tools.iter().enumerate() {
        let actor = actor as u32 + 1;
        let take = Request {
            entity: *tool,
            action: ObjectAction::Tool(ToolAction::Hold { actor, time: 1.0 }),
        };
        snapshots += world.dispatch(Some(actor), take, 1.0).into_iter().count();
    }
    for round in 0..3 {
        for resource in &resources {
            let hit = Request {
                entity: *resource,
                action: ObjectAction::Resource(ResourceAction::Hit {
                    time: 2.0 + round as f64,
                }),
            };
            snapshots += world.dispatch(Some(1), hit, 2.0).into_iter().count();
        }
    }
    snapshots += world.tick(40.0).len();

    let duration = start.elapsed();
    println!("World dispatch: {} snapshots in {:?}", snapshots, duration);

    assert_eq!(snapshots, tools.len() + resources.len() * 4);
    assert!(duration.as_millis() < 500);
}

/// Benchmarks respawn deadline bookkeeping
#[test]
fn benchmark_respawn_scheduler() {
    let mut scheduler = RespawnScheduler::new();
    let iterations = 10_000;

    let start = Instant::now();

    for entity in 0..iterations {
        scheduler.schedule(entity, (entity % 100) as f64);
    }
    let fired: usize = (0..100).map(|now| scheduler.due(now as f64).len()).sum();

    let duration = start.elapsed();
    println!("Respawn scheduler: {} deadlines in {:?}", fired, duration);

    assert_eq!(fired, iterations as usize);
    assert!(scheduler.is_empty());
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks packet serialization for join welcomes
#[test]
fn benchmark_packet_serialization() {
    let world = WorldState::from_scene(&SceneConfig {
        tools: 20,
        resources: 50,
        resource_fields: ResourceFields::default(),
    });
    let packet = Packet::Welcome {
        actor_id: 1,
        time: 12.0,
        tuning: Tuning::default(),
        objects: world.snapshots(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = serialize(&packet).unwrap();
        let _: Packet = deserialize(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Welcome serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks bus fan-out to many subscribers
#[test]
fn benchmark_bus_fanout() {
    let bus = Bus::new();
    let mut subscribers: Vec<_> = (0..50).map(|_| bus.subscribe()).collect();

    let iterations = 100;
    let start = Instant::now();
    let mut received = 0;

    for i in 0..iterations {
        bus.publish(Signal::PickupQuery { actor: i });
        for subscriber in &mut subscribers {
            while subscriber.next().is_some() {
                received += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!("Bus fan-out: {} deliveries in {:?}", received, duration);

    assert_eq!(received, iterations as usize * subscribers.len());
    assert!(duration.as_millis() < 500);
}

/// Stress tests pointer routing and bus draining with many views
#[test]
fn stress_test_pointer_routing() {
    let world = WorldState::from_scene(&SceneConfig {
        tools: 50,
        resources: 50,
        resource_fields: ResourceFields::default(),
    });
    let mut host = RecordingHost::new(1, 10.0);
    let mut client = ClientWorld::new(Tuning::default());
    client.load(&mut host, world.snapshots());

    let iterations = 1_000;
    let start = Instant::now();

    for i in 0..iterations {
        host.time = 10.0 + i as f64;
        let target = (i % 100) as u32 + 1;
        let mesh = if target <= 50 { Mesh::Stand } else { Mesh::Trunk };
        client.pointer_down(&mut host, PointerEvent::on(target, mesh, 1.0));
        client.take_outbox();
    }

    let duration = start.elapsed();
    println!(
        "Pointer routing: {} clicks over 100 views in {:?}",
        iterations, duration
    );

    assert!(duration.as_millis() < 2000);
}
