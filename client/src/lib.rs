mod codec;
mod room;
mod store;
mod sync;

pub use codec::*;
pub use room::*;
pub use store::*;
pub use sync::*;
