//! System-wide constants for the HubBridge model.

/// Amount of the coin that seeds the escrow at genesis. It is also the
/// genesis anchor and is counted in the initial mint.
pub const DEFAULT_GENESIS_SEED_AMOUNT: u64 = 1;

/// Smallest change output a settlement may leave behind as the next anchor.
pub const DEFAULT_MIN_SEED_AMOUNT: u64 = 1;

/// Index of the genesis anchor in the escrow ledger.
pub const GENESIS_ANCHOR_INDEX: u64 = 0;

/// Default number of harness steps per simulated run.
pub const DEFAULT_SIM_STEPS: usize = 200;

/// Upper bound (inclusive) for randomly drawn deposit amounts.
pub const DEFAULT_SIM_MAX_DEPOSIT: u64 = 100;

/// Upper bound (inclusive) for randomly drawn withdrawal amounts.
pub const DEFAULT_SIM_MAX_WITHDRAWAL: u64 = 100;

/// Domain separator for the state digest.
pub const STATE_DIGEST_DOMAIN: &[u8] = b"hubbridge:state:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
