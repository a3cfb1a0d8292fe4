//! Simulation driver.
//!
//! Owns the world and one [`ResourceAllocator`] per sector per top-level
//! country. A step is one full round: every allocator runs exactly once,
//! then the whole tree ticks and tocks. Sectors interact only through
//! values committed in the previous round, so allocator order within a
//! step does not change any result.

use tracing::debug;

use crate::allocator::{ResourceAllocator, SolverOptions};
use crate::domain::Sector;
use crate::report::{AllocationRecord, IterationReport};
use crate::society::World;

pub struct Simulation {
    world: World,
    allocators: Vec<ResourceAllocator>,
}

impl Simulation {
    /// Wrap a constructed world. Allocators are fixed here: one per sector
    /// for each top-level country present at construction.
    pub fn new(world: World, options: SolverOptions) -> Self {
        let allocators = world
            .roots()
            .iter()
            .flat_map(|&country| {
                Sector::ALL
                    .iter()
                    .map(move |&sector| ResourceAllocator::new(country, sector, options))
            })
            .collect();
        Self { world, allocators }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    /// Run one allocate/tick/tock round and snapshot the settled state.
    pub fn step(&mut self) -> IterationReport {
        let period = self.world.clock();
        let mut allocations = Vec::with_capacity(self.allocators.len());
        for allocator in &self.allocators {
            let outcome = allocator.run(&mut self.world);
            allocations.push(AllocationRecord {
                country: self.world.node(allocator.country()).name().to_string(),
                sector: allocator.sector(),
                outcome,
            });
        }

        self.world.tick();
        self.world.tock();
        debug!(
            "period {} settled with {} allocations",
            period,
            allocations.len()
        );

        IterationReport::capture(&self.world, period, allocations)
    }

    /// Run a fixed number of rounds, reporting each.
    pub fn run(&mut self, iterations: u32) -> Vec<IterationReport> {
        let mut reports = Vec::with_capacity(iterations as usize);
        for _ in 0..iterations {
            reports.push(self.step());
        }
        reports
    }
}
