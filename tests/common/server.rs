//! Test server management.
//!
//! Spawns and manages pulsed instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Timing knobs written into the generated config.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub heartbeat_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub pulse_window_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 60_000,
            sweep_interval_ms: 5_000,
            pulse_window_ms: 300,
        }
    }
}

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with default timing.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, Timing::default()).await
    }

    /// Spawn a server with the given timing.
    pub async fn spawn_with(port: u16, timing: Timing) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test.hub"
metrics_port = 0

[listen]
address = "127.0.0.1:{port}"

[heartbeat]
timeout_ms = {timeout}
sweep_interval_ms = {sweep}

[pulse]
window_ms = {window}

[links]
user1 = ["user2", "user3"]
user2 = ["user1"]
user3 = ["user1"]
user4 = ["user5"]
user5 = ["user4"]
"#,
            timeout = timing.heartbeat_timeout_ms,
            sweep = timing.sweep_interval_ms,
            window = timing.pulse_window_ms,
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_pulsed"))
            .arg(&config_path)
            .env_remove("PORT")
            .env_remove("PULSEHUB_LISTEN")
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Connect a client and complete the identity handshake.
    pub async fn connect(&self, user: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address(), user).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
