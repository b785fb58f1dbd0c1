mod friend;
mod ledger;
mod money;
mod settlement;
mod transazione;
mod user;

pub use friend::*;
pub use ledger::*;
pub use money::*;
pub use settlement::*;
pub use transazione::*;
pub use user::*;
