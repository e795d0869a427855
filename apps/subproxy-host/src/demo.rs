//! Manual walk-through of a runner proxy: construct, read, mutate, compare.

use crate::error::HostError;

use subproxy_core::{Kwargs, ProxyFactory, ProxyHandle, Value};

use log::info;
use serde::Serialize;
use serde_json::json;

const CONSTRUCTOR_X: i64 = 6;
const MUTATED_X: i64 = 7;
const MUTATED_Y: i64 = 15;

/// Observable state of one runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub x: Value,
    pub y: Value,
    pub z: Value,
}

impl Snapshot {
    pub fn read(runner: &ProxyHandle) -> Result<Self, HostError> {
        Ok(Self {
            x: runner.get_attr("x")?,
            y: runner.call("get_y", vec![])?,
            z: runner.get_attr("z")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoReport {
    pub initial: Snapshot,
    pub mutated: Snapshot,
    /// Second runner, built with the same arguments and never touched.
    pub untouched: Snapshot,
    pub worker_pids: (u32, u32),
}

/// Run the scenario against two runners produced by `factory`.
pub fn run_scenario(factory: &ProxyFactory) -> Result<DemoReport, HostError> {
    let mut kwargs = Kwargs::new();
    kwargs.insert("x".to_string(), json!(CONSTRUCTOR_X));

    let runner = factory.spawn(vec![], kwargs.clone())?;
    let runner2 = factory.spawn(vec![], kwargs)?;
    info!(
        "Runners started in workers {} and {} via {}",
        runner.pid(),
        runner2.pid(),
        runner.info().strategy
    );

    let initial = Snapshot::read(&runner)?;
    info!("Initial: x={} y={} z={}", initial.x, initial.y, initial.z);

    runner.set("x", MUTATED_X)?;
    runner.call("set_y", vec![json!(MUTATED_Y)])?;
    runner.set_item("z", json!({"a": 3, "b": 4}))?;

    // Editing a returned value only changes the local copy.
    let mut z = runner.get_attr("z")?;
    if let Some(fields) = z.as_object_mut() {
        fields.insert("a".to_string(), json!(5));
    }

    let mutated = Snapshot::read(&runner)?;
    info!("Post-set: x={} y={} z={}", mutated.x, mutated.y, mutated.z);

    let untouched = Snapshot::read(&runner2)?;
    info!("Unaffected: x={} y={} z={}", untouched.x, untouched.y, untouched.z);

    let worker_pids = (runner.pid(), runner2.pid());

    runner.close()?;
    runner2.close()?;

    Ok(DemoReport {
        initial,
        mutated,
        untouched,
        worker_pids,
    })
}
