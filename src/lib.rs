// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod document;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod generator;
pub mod logging;
pub mod readiness;
pub mod store;
pub mod types;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, OutputFormat};
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::dag::DependencyGraph;
use crate::generator::Generator;
use crate::types::ValidationPolicy;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the plan, prints its dependency network, and fails
/// when the network is invalid under the plan's validation policy.
pub fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate(&args.config)?;
    info!(config = %args.config.display(), migrations = plan.migration.len(), "plan loaded");

    let graph = plan_graph(&plan);
    match args.format {
        OutputFormat::Text => {
            if args.details {
                print_details(&plan);
            }
            print!("{graph}");
        }
        OutputFormat::Json => println!("{}", graph.to_json()?),
    }

    match graph.validate() {
        Ok(()) => {
            debug!("dependency network is valid");
            Ok(())
        }
        Err(err) => match plan.config.validation {
            ValidationPolicy::Require => Err(err.into()),
            ValidationPolicy::Warn => {
                for problem in &err.problems {
                    warn!(%problem, "dependency network problem");
                }
                Ok(())
            }
        },
    }
}

/// Dependency network of a plan: one node per migration, one edge per
/// `after` entry.
pub fn plan_graph(plan: &PlanFile) -> DependencyGraph {
    let graph = DependencyGraph::new();
    for (id, migration) in plan.migration.iter() {
        graph.add_node(id);
        graph.add(id, migration.after.iter().cloned());
    }
    graph
}

/// One generator per migration in the plan.
pub fn generators_from_plan(plan: &PlanFile) -> Vec<Generator> {
    plan.generators().into_iter().map(Generator::new).collect()
}

fn print_details(plan: &PlanFile) {
    println!("migradag plan");
    println!("  config.metadata = {}", plan.metadata_namespace());
    println!("  config.workers = {}", plan.config.workers);
    println!("  config.validation = {:?}", plan.config.validation);
    println!();

    println!("migrations ({}):", plan.migration.len());
    for (id, m) in plan.migration.iter() {
        println!("  - {id}");
        println!("      ns: {}", m.namespace());
        println!("      operation: {}", m.operation);
        if !m.query.is_empty() {
            println!("      query: {}", m.query);
        }
        if let Some(ref update) = m.update {
            println!("      update: {update}");
        }
        if let Some(limit) = m.limit {
            println!("      limit: {limit}");
        }
        if !m.after.is_empty() {
            println!("      after: {:?}", m.after);
        }
    }
    println!();
}
