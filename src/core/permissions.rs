//! Runtime permission acquisition
//! Works out which Bluetooth permissions the platform wants and asks for
//! them once per process. A refusal is only logged; scanning then fails on
//! its own.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android { api_level: u32 },
    Ios,
    MacOs,
    /// Linux, Windows and anything else without a runtime Bluetooth prompt
    Desktop,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::Android {
                api_level: android_api_level(),
            }
        }
        #[cfg(target_os = "ios")]
        {
            Self::Ios
        }
        #[cfg(target_os = "macos")]
        {
            Self::MacOs
        }
        #[cfg(not(any(target_os = "android", target_os = "ios", target_os = "macos")))]
        {
            Self::Desktop
        }
    }

    pub fn permission_plan(self) -> PermissionPlan {
        match self {
            Self::Android { api_level } if api_level >= 31 => PermissionPlan::Request(vec![
                Permission::BluetoothScan,
                Permission::BluetoothConnect,
            ]),
            Self::Android { api_level } if api_level >= 23 => {
                PermissionPlan::CheckThenRequest(Permission::AccessFineLocation)
            }
            Self::Ios | Self::MacOs => PermissionPlan::Request(vec![Permission::Bluetooth]),
            Self::Android { .. } | Self::Desktop => PermissionPlan::NotRequired,
        }
    }
}

#[cfg(target_os = "android")]
fn android_api_level() -> u32 {
    std::process::Command::new("getprop")
        .arg("ro.build.version.sdk")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|s| s.trim().parse().ok())
        // unknown: assume a current release
        .unwrap_or(31)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// android.permission.BLUETOOTH_SCAN
    BluetoothScan,
    /// android.permission.BLUETOOTH_CONNECT
    BluetoothConnect,
    /// android.permission.ACCESS_FINE_LOCATION
    AccessFineLocation,
    /// CoreBluetooth authorization
    Bluetooth,
}

impl Permission {
    /// Name the mobile permission plugin registers this permission under
    pub fn alias(self) -> &'static str {
        match self {
            Self::BluetoothScan => "bluetoothScan",
            Self::BluetoothConnect => "bluetoothConnect",
            Self::AccessFineLocation => "accessFineLocation",
            Self::Bluetooth => "bluetooth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionPlan {
    NotRequired,
    /// Ask for all of these in one prompt
    Request(Vec<Permission>),
    /// Ask only when the check says the permission is missing
    CheckThenRequest(Permission),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    NotRequired,
}

/// The platform's permission dialog
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn check(&self, permission: Permission) -> bool;
    async fn request(&self, permissions: &[Permission]) -> bool;
}

/// Permission state as reported by a mobile plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    PromptWithRationale,
    #[serde(other)]
    Unknown,
}

/// Native permission calls of a mobile plugin, keyed by [`Permission::alias`]
#[async_trait]
pub trait PermissionApi: Send + Sync {
    async fn check_permissions(&self) -> Result<HashMap<String, PermissionState>>;
    async fn request_permissions(
        &self,
        aliases: Vec<&'static str>,
    ) -> Result<HashMap<String, PermissionState>>;
}

/// Prompts through a mobile plugin's permission dialog.
pub struct NativePrompt {
    api: Arc<dyn PermissionApi>,
}

impl NativePrompt {
    pub fn new(api: Arc<dyn PermissionApi>) -> Self {
        Self { api }
    }
}

fn all_granted(states: &HashMap<String, PermissionState>, permissions: &[Permission]) -> bool {
    permissions.iter().all(|permission| {
        let state = states.get(permission.alias());
        if state != Some(&PermissionState::Granted) {
            debug!("{:?} is {:?}", permission, state);
            return false;
        }
        true
    })
}

#[async_trait]
impl PermissionPrompt for NativePrompt {
    async fn check(&self, permission: Permission) -> bool {
        match self.api.check_permissions().await {
            Ok(states) => all_granted(&states, &[permission]),
            Err(e) => {
                warn!("Cannot check {:?}: {}", permission, e);
                false
            }
        }
    }

    async fn request(&self, permissions: &[Permission]) -> bool {
        let aliases: Vec<_> = permissions.iter().map(|p| p.alias()).collect();
        match self.api.request_permissions(aliases).await {
            Ok(states) => all_granted(&states, permissions),
            Err(e) => {
                error!("Permission request for {:?} failed: {}", permissions, e);
                false
            }
        }
    }
}

/// Whether the Bluetooth adapter can be used yet
#[async_trait]
pub trait AdapterAvailability: Send + Sync {
    async fn is_available(&self) -> bool;
    /// Waits for the adapter; false on error or timeout.
    async fn wait_available(&self) -> bool;
}

/// Prompt for platforms where the OS asks on first adapter use. Only
/// [`Permission::Bluetooth`] can be granted this way.
pub struct AdapterPrompt {
    adapter: Arc<dyn AdapterAvailability>,
}

impl AdapterPrompt {
    pub fn new(adapter: Arc<dyn AdapterAvailability>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl PermissionPrompt for AdapterPrompt {
    async fn check(&self, permission: Permission) -> bool {
        if permission != Permission::Bluetooth {
            warn!("No prompt for {:?} on this platform", permission);
            return false;
        }
        self.adapter.is_available().await
    }

    async fn request(&self, permissions: &[Permission]) -> bool {
        if let Some(other) = permissions.iter().find(|p| **p != Permission::Bluetooth) {
            warn!("No prompt for {:?} on this platform", other);
            return false;
        }
        debug!("Waiting for adapter to grant {:?}", permissions);
        self.adapter.wait_available().await
    }
}

/// Runs the permission plan of a platform at most once
pub struct PermissionGate {
    platform: Platform,
    outcome: OnceCell<PermissionOutcome>,
}

impl PermissionGate {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            outcome: OnceCell::new(),
        }
    }

    pub fn outcome(&self) -> Option<PermissionOutcome> {
        self.outcome.get().copied()
    }

    /// Acquires the permissions on first call; later calls return the first outcome.
    pub async fn acquire(&self, prompt: &dyn PermissionPrompt) -> PermissionOutcome {
        *self
            .outcome
            .get_or_init(|| Self::run(self.platform, prompt))
            .await
    }

    async fn run(platform: Platform, prompt: &dyn PermissionPrompt) -> PermissionOutcome {
        let outcome = match platform.permission_plan() {
            PermissionPlan::NotRequired => PermissionOutcome::NotRequired,
            PermissionPlan::Request(permissions) => {
                if prompt.request(&permissions).await {
                    PermissionOutcome::Granted
                } else {
                    PermissionOutcome::Denied
                }
            }
            PermissionPlan::CheckThenRequest(permission) => {
                if prompt.check(permission).await {
                    debug!("{:?} already granted", permission);
                    PermissionOutcome::Granted
                } else if prompt.request(&[permission]).await {
                    PermissionOutcome::Granted
                } else {
                    PermissionOutcome::Denied
                }
            }
        };

        match outcome {
            PermissionOutcome::Granted => info!("User accepts runtime permissions on {:?}", platform),
            PermissionOutcome::Denied => error!("User refuses runtime permissions on {:?}", platform),
            PermissionOutcome::NotRequired => debug!("No runtime permissions needed on {:?}", platform),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePrompt {
        already_granted: bool,
        accept: bool,
        checks: Mutex<Vec<Permission>>,
        requests: Mutex<Vec<Vec<Permission>>>,
    }

    #[async_trait]
    impl PermissionPrompt for FakePrompt {
        async fn check(&self, permission: Permission) -> bool {
            self.checks.lock().unwrap().push(permission);
            self.already_granted
        }

        async fn request(&self, permissions: &[Permission]) -> bool {
            self.requests.lock().unwrap().push(permissions.to_vec());
            self.accept
        }
    }

    #[test]
    fn plans_follow_platform_and_version() {
        assert_eq!(
            Platform::Android { api_level: 33 }.permission_plan(),
            PermissionPlan::Request(vec![Permission::BluetoothScan, Permission::BluetoothConnect])
        );
        assert_eq!(
            Platform::Android { api_level: 28 }.permission_plan(),
            PermissionPlan::CheckThenRequest(Permission::AccessFineLocation)
        );
        assert_eq!(
            Platform::Android { api_level: 21 }.permission_plan(),
            PermissionPlan::NotRequired
        );
        assert_eq!(
            Platform::Ios.permission_plan(),
            PermissionPlan::Request(vec![Permission::Bluetooth])
        );
        assert_eq!(Platform::Desktop.permission_plan(), PermissionPlan::NotRequired);
    }

    #[tokio::test]
    async fn prompts_only_once() {
        let gate = PermissionGate::new(Platform::Android { api_level: 31 });
        let prompt = FakePrompt {
            accept: true,
            ..Default::default()
        };

        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::Granted);
        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::Granted);

        assert_eq!(prompt.requests.lock().unwrap().len(), 1);
        assert_eq!(gate.outcome(), Some(PermissionOutcome::Granted));
    }

    #[tokio::test]
    async fn legacy_android_skips_request_when_already_granted() {
        let gate = PermissionGate::new(Platform::Android { api_level: 26 });
        let prompt = FakePrompt {
            already_granted: true,
            ..Default::default()
        };

        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::Granted);
        assert_eq!(*prompt.checks.lock().unwrap(), vec![Permission::AccessFineLocation]);
        assert!(prompt.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refusal_is_reported_as_denied() {
        let gate = PermissionGate::new(Platform::Android { api_level: 26 });
        let prompt = FakePrompt::default();

        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::Denied);
        assert_eq!(
            *prompt.requests.lock().unwrap(),
            vec![vec![Permission::AccessFineLocation]]
        );
    }

    #[derive(Default)]
    struct FakeApi {
        granted: Vec<&'static str>,
        requested: Mutex<Vec<Vec<&'static str>>>,
    }

    impl FakeApi {
        fn states(&self, aliases: &[&'static str]) -> HashMap<String, PermissionState> {
            aliases
                .iter()
                .map(|alias| {
                    let state = if self.granted.contains(alias) {
                        PermissionState::Granted
                    } else {
                        PermissionState::Denied
                    };
                    (alias.to_string(), state)
                })
                .collect()
        }
    }

    #[async_trait]
    impl PermissionApi for FakeApi {
        async fn check_permissions(&self) -> Result<HashMap<String, PermissionState>> {
            Ok(self.states(&["bluetoothScan", "bluetoothConnect", "accessFineLocation"]))
        }

        async fn request_permissions(
            &self,
            aliases: Vec<&'static str>,
        ) -> Result<HashMap<String, PermissionState>> {
            let states = self.states(&aliases);
            self.requested.lock().unwrap().push(aliases);
            Ok(states)
        }
    }

    #[derive(Default)]
    struct FakeAdapter {
        available: bool,
        checks: Mutex<usize>,
        waits: Mutex<usize>,
    }

    #[async_trait]
    impl AdapterAvailability for FakeAdapter {
        async fn is_available(&self) -> bool {
            *self.checks.lock().unwrap() += 1;
            self.available
        }

        async fn wait_available(&self) -> bool {
            *self.waits.lock().unwrap() += 1;
            self.available
        }
    }

    #[tokio::test]
    async fn native_prompt_requests_the_planned_permissions() {
        let api = Arc::new(FakeApi {
            granted: vec!["bluetoothScan", "bluetoothConnect"],
            ..Default::default()
        });
        let gate = PermissionGate::new(Platform::Android { api_level: 33 });

        assert_eq!(gate.acquire(&NativePrompt::new(api.clone())).await, PermissionOutcome::Granted);
        assert_eq!(
            *api.requested.lock().unwrap(),
            vec![vec!["bluetoothScan", "bluetoothConnect"]]
        );
    }

    #[tokio::test]
    async fn native_prompt_denies_when_one_permission_is_refused() {
        let api = Arc::new(FakeApi {
            granted: vec!["bluetoothScan"],
            ..Default::default()
        });
        let gate = PermissionGate::new(Platform::Android { api_level: 31 });

        assert_eq!(gate.acquire(&NativePrompt::new(api.clone())).await, PermissionOutcome::Denied);
    }

    #[tokio::test]
    async fn native_prompt_checks_location_before_asking() {
        let api = Arc::new(FakeApi {
            granted: vec!["accessFineLocation"],
            ..Default::default()
        });
        let gate = PermissionGate::new(Platform::Android { api_level: 28 });

        assert_eq!(gate.acquire(&NativePrompt::new(api.clone())).await, PermissionOutcome::Granted);
        assert!(api.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn adapter_prompt_waits_for_bluetooth() {
        let adapter = Arc::new(FakeAdapter {
            available: true,
            ..Default::default()
        });
        let gate = PermissionGate::new(Platform::MacOs);

        let outcome = gate.acquire(&AdapterPrompt::new(adapter.clone())).await;

        assert_eq!(outcome, PermissionOutcome::Granted);
        assert_eq!(*adapter.waits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn adapter_prompt_cannot_grant_android_permissions() {
        let adapter = Arc::new(FakeAdapter {
            available: true,
            ..Default::default()
        });
        let prompt = AdapterPrompt::new(adapter.clone());

        assert!(!prompt.request(&[Permission::BluetoothScan, Permission::BluetoothConnect]).await);
        assert!(!prompt.check(Permission::AccessFineLocation).await);
        assert_eq!(*adapter.checks.lock().unwrap(), 0);
        assert_eq!(*adapter.waits.lock().unwrap(), 0);

        let gate = PermissionGate::new(Platform::Android { api_level: 31 });
        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::Denied);
    }

    #[test]
    fn plugin_states_use_kebab_case() {
        let states: HashMap<String, PermissionState> = serde_json::from_str(
            r#"{"bluetoothScan":"granted","accessFineLocation":"prompt-with-rationale","x":"limited"}"#,
        )
        .unwrap();
        assert_eq!(states["bluetoothScan"], PermissionState::Granted);
        assert_eq!(states["accessFineLocation"], PermissionState::PromptWithRationale);
        assert_eq!(states["x"], PermissionState::Unknown);
    }

    #[tokio::test]
    async fn desktop_never_prompts() {
        let gate = PermissionGate::new(Platform::Desktop);
        let prompt = FakePrompt::default();

        assert_eq!(gate.acquire(&prompt).await, PermissionOutcome::NotRequired);
        assert!(prompt.checks.lock().unwrap().is_empty());
        assert!(prompt.requests.lock().unwrap().is_empty());
    }
}
