//! Server management - reachability probing, an optional managed server
//! process and the login API preflight

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::login::Credentials;

/// Poll `url` until the server answers with anything below 500.
///
/// Connection errors are expected while a server is starting and only the
/// first one is logged.
pub async fn wait_for_reachable(url: &Url, timeout_duration: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url.clone()).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                debug!("{} answered {} after {} attempt(s)", url, resp.status(), attempts);
                return Ok(());
            }
            Ok(resp) => {
                warn!("Reachability check returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                if !e.is_connect() && !e.is_timeout() {
                    warn!("Reachability check error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            return Err(E2eError::ServerHealthCheck {
                url: url.to_string(),
                attempts,
            });
        }
        sleep(Duration::from_millis(100)).await;
    }
}

/// User record returned by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUser {
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
struct LoginRejection {
    #[serde(default)]
    message: String,
}

/// POST the credentials to `<base>/login` and expect a session token.
///
/// This catches a wrong password or an unseeded user database before a
/// browser is launched.
pub async fn login_preflight(base_url: &Url, credentials: &Credentials) -> E2eResult<LoginResponse> {
    let endpoint = base_url.join("/login").map_err(|e| {
        E2eError::InvalidConfig(format!("cannot build login endpoint from {}: {}", base_url, e))
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    debug!("Login preflight for '{}' at {}", credentials.login, endpoint);

    let resp = client
        .post(endpoint.clone())
        .json(&serde_json::json!({
            "login": credentials.login,
            "password": credentials.password,
        }))
        .send()
        .await?;

    let status = resp.status();
    if status.is_success() {
        let body: LoginResponse = resp.json().await?;
        if body.token.is_empty() {
            return Err(E2eError::Authentication {
                url: endpoint.to_string(),
                message: "response carried an empty token".to_string(),
            });
        }
        info!(
            "Login preflight accepted '{}' (role: {})",
            credentials.login,
            body.user.as_ref().map(|u| u.role.as_str()).unwrap_or("unknown")
        );
        return Ok(body);
    }

    let message = match resp.json::<LoginRejection>().await {
        Ok(r) if !r.message.is_empty() => r.message,
        _ => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    let message = if status == StatusCode::UNAUTHORIZED {
        message
    } else {
        format!("{} ({})", message, status)
    };

    Err(E2eError::Authentication {
        url: endpoint.to_string(),
        message,
    })
}

/// Handle to an application process started by the harness
pub struct ServerHandle {
    child: Child,
    base_url: Url,
}

impl ServerHandle {
    /// Start the application under test and wait until it answers
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let (program, args) = config.command.split_first().ok_or_else(|| {
            E2eError::ServerStartup("server command is empty".to_string())
        })?;

        let port = match config.port {
            Some(p) => p,
            None => find_free_port()?,
        };
        let base_url = Url::parse(&format!("http://127.0.0.1:{}/", port))
            .map_err(|e| E2eError::ServerStartup(e.to_string()))?;

        info!("Spawning '{}' on port {}", config.command.join(" "), port);

        let mut cmd = Command::new(program);
        cmd.args(args).env("PORT", port.to_string());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", program, e))
        })?;

        let handle = ServerHandle { child, base_url };

        // Dropping the handle on failure stops the process.
        wait_for_reachable(&handle.base_url, config.startup_timeout).await?;

        info!("Server is reachable at {}", handle.base_url);
        Ok(handle)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        info!("Stopping server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for an application process started by the harness
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Program and arguments, e.g. `["node", "server.js"]`; empty means the
    /// application is already running at the base URL
    pub command: Vec<String>,

    /// Directory to start the program in
    pub working_dir: Option<PathBuf>,

    /// Extra environment for the program
    pub env: Vec<(String, String)>,

    /// Port passed as `PORT` (None = find free port)
    pub port: Option<u16>,

    /// How long to wait for the base URL to answer
    pub startup_timeout: Duration,

    /// Poll an already running application before launching the browser.
    /// A managed server is always waited for.
    pub wait_for_ready: bool,

    /// Run [`login_preflight`] before launching the browser
    pub api_preflight: bool,
}

impl ServerConfig {
    pub fn is_managed(&self) -> bool {
        !self.command.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            port: None,
            startup_timeout: Duration::from_secs(30),
            wait_for_ready: false,
            api_preflight: false,
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 1024);
    }

    #[test]
    fn test_default_is_unmanaged() {
        let config = ServerConfig::default();
        assert!(!config.is_managed());
        assert!(!config.api_preflight);
    }

    #[tokio::test]
    async fn test_spawn_rejects_empty_command() {
        let err = ServerHandle::spawn(ServerConfig::default()).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_)));
    }

    #[tokio::test]
    async fn test_unreachable_reports_attempts() {
        let port = find_free_port().unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = wait_for_reachable(&url, Duration::from_millis(300)).await.unwrap_err();
        match err {
            E2eError::ServerHealthCheck { attempts, .. } => assert!(attempts >= 2),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
