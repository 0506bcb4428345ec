use cucumber::given;

use crate::cucumber::{bank_world::ReconciliationSystem, BankWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut BankWorld) {
    let system = ReconciliationSystem::new().await;
    world.system = Some(system);
}
