//! Upstream provider integrations.

pub mod etherscan {
    pub use crate::etherscan::*;
}

pub mod debank {
    pub use crate::debank::*;
}

pub mod fetch_client {
    pub use crate::fetch_client::*;
}

pub mod chains {
    pub use crate::chains::*;
}
