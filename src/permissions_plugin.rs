//! Tauri plugin exposing the Android runtime permission dialog
//! The Kotlin half lives in `gen/android/.../BlePermissionsPlugin.kt` and
//! declares the permission aliases of [`crate::core::permissions::Permission`].

use tauri::Runtime;
use tauri::plugin::{Builder, TauriPlugin};

#[cfg(target_os = "android")]
pub use android::AndroidPermissions;

pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("ble-permissions")
        .setup(|app, api| {
            #[cfg(target_os = "android")]
            {
                use tauri::Manager;
                let handle = api.register_android_plugin("com.bleledremote.app", "BlePermissionsPlugin")?;
                app.manage(AndroidPermissions(handle));
            }
            #[cfg(not(target_os = "android"))]
            let _ = (app, api);
            Ok(())
        })
        .build()
}

#[cfg(target_os = "android")]
mod android {
    use std::collections::HashMap;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde::Serialize;
    use tauri::Runtime;
    use tauri::plugin::PluginHandle;

    use crate::core::permissions::{PermissionApi, PermissionState};

    #[derive(Serialize)]
    struct RequestPermissions {
        permissions: Vec<&'static str>,
    }

    pub struct AndroidPermissions<R: Runtime>(pub(super) PluginHandle<R>);

    impl<R: Runtime> Clone for AndroidPermissions<R> {
        fn clone(&self) -> Self {
            Self(self.0.clone())
        }
    }

    #[async_trait]
    impl<R: Runtime> PermissionApi for AndroidPermissions<R> {
        async fn check_permissions(&self) -> Result<HashMap<String, PermissionState>> {
            let handle = self.0.clone();
            let states = tauri::async_runtime::spawn_blocking(move || {
                handle.run_mobile_plugin::<HashMap<String, PermissionState>>("checkPermissions", ())
            })
            .await??;
            Ok(states)
        }

        async fn request_permissions(
            &self,
            aliases: Vec<&'static str>,
        ) -> Result<HashMap<String, PermissionState>> {
            let handle = self.0.clone();
            // blocks until the user answers the dialog
            let states = tauri::async_runtime::spawn_blocking(move || {
                handle.run_mobile_plugin::<HashMap<String, PermissionState>>(
                    "requestPermissions",
                    RequestPermissions { permissions: aliases },
                )
            })
            .await??;
            Ok(states)
        }
    }
}
