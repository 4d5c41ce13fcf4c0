//! Constants used throughout the application
//! This module contains the fixed identifiers of the LED peripheral and the
//! default scan and connection parameters.

use uuid::Uuid;

/// The GATT service carrying the LED characteristics
pub const UUID_LED_SERVICE: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);

/// The only peripheral kept from the discovery stream
pub const TARGET_PERIPHERAL_ID: &str = "391b3ed1-3c1f-f939-8514-83136574aca9";

/// Red LED characteristic
pub const UUID_RED_LED_CHAR: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Green LED characteristic
pub const UUID_GREEN_LED_CHAR: Uuid = Uuid::from_u128(0x1c95d5e3_d8f7_413a_bf3d_7a2e5d7be87e);

/// Yellow LED characteristic
pub const UUID_YELLOW_LED_CHAR: Uuid = Uuid::from_u128(0x5b316b93_f7ec_4faf_84b7_35522cdeadfb);

/// Name shown for peripherals that advertise none
pub const NO_NAME_PLACEHOLDER: &str = "NO NAME";

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Whether repeated advertisements of the same peripheral are reported
pub const DEFAULT_ALLOW_DUPLICATES: bool = true;

/// Delay between connection confirmation and service discovery, lets bonding settle
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 900;

/// Upper bound on waiting for the adapter to report it is usable
pub const DEFAULT_PERMISSION_TIMEOUT_SECS: u64 = 10;
