use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub install_dir: PathBuf,
    pub env_file: PathBuf,
    pub tmp_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let install_dir = temp_dir.path().join("home").join(".luau");
        let env_file = temp_dir.path().join("user-env.json");
        let tmp_dir = temp_dir.path().join("tmp");
        std::fs::create_dir_all(&tmp_dir).expect("Failed to create tmp dir");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_luaup"));

        Self {
            _temp_dir: temp_dir,
            install_dir,
            env_file,
            tmp_dir,
            bin_path,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("LUAUP_INSTALL_DIR", &self.install_dir);
        cmd.env("LUAUP_ENV_FILE", &self.env_file);
        cmd.env("LUAUP_API_URL", closed_local_url("/releases/latest"));
        cmd.env("TMPDIR", &self.tmp_dir);
        cmd.env("HOME", self._temp_dir.path().join("home"));
        for var in [
            "RUST_LOG",
            "GITHUB_TOKEN",
            "HTTP_PROXY",
            "http_proxy",
            "HTTPS_PROXY",
            "https_proxy",
            "ALL_PROXY",
            "all_proxy",
        ] {
            cmd.env_remove(var);
        }
        cmd.arg("--no-pause");
        cmd
    }

    /// Seeds the user environment file with a PATH value.
    pub fn set_user_path(&self, value: &str) {
        let content = serde_json::json!({ "PATH": value }).to_string();
        std::fs::write(&self.env_file, content).expect("Failed to write env file");
    }

    pub fn user_path(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.env_file).ok()?;
        let vars: HashMap<String, String> =
            serde_json::from_str(&content).expect("Env file was not valid JSON");
        vars.get("PATH").cloned()
    }

    pub fn install_dir_str(&self) -> String {
        self.install_dir.to_string_lossy().to_string()
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(
            !self.status.success(),
            "Command unexpectedly succeeded\nstdout: {}",
            self.stdout
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// A loopback URL whose port was just released, so requests are refused.
pub fn closed_local_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind a free port");
    let port = listener.local_addr().expect("No local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}

/// Minimal HTTP server answering GETs from a fixed route table.
#[allow(dead_code)]
pub struct ReleaseServer {
    pub base_url: String,
    pub user_agents: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl ReleaseServer {
    /// Serves a release listing `assets` (name, route) plus the given files.
    pub fn start(assets: &[(&str, &str)], files: Vec<(&str, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind server");
        let base_url = format!("http://{}", listener.local_addr().expect("No local addr"));

        let assets: Vec<_> = assets
            .iter()
            .map(|(name, route)| {
                serde_json::json!({
                    "name": name,
                    "browser_download_url": format!("{}{}", base_url, route),
                })
            })
            .collect();
        let mut routes: HashMap<String, Vec<u8>> = files
            .into_iter()
            .map(|(route, body)| (route.to_string(), body))
            .collect();
        routes.insert(
            "/releases/latest".to_string(),
            serde_json::json!({ "tag_name": "0.650", "assets": assets })
                .to_string()
                .into_bytes(),
        );

        let user_agents = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&user_agents);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let Ok(read_half) = stream.try_clone() else { continue };
                let mut reader = BufReader::new(read_half);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {
                            if let Some((name, value)) = line.split_once(':') {
                                if name.eq_ignore_ascii_case("user-agent") {
                                    seen.lock().unwrap().push(value.trim().to_string());
                                }
                            }
                        }
                    }
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match routes.get(path) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", b"not found".to_vec()),
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
            }
        });

        Self {
            base_url,
            user_agents,
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/releases/latest", self.base_url)
    }
}

/// A small stand-in for the Luau release archive.
#[allow(dead_code)]
pub fn luau_zip() -> Vec<u8> {
    use zip::write::FileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("luau.exe", FileOptions::default())
        .expect("Failed to start zip entry");
    writer.write_all(b"luau").expect("Failed to write zip entry");
    writer
        .start_file("luau-compile.exe", FileOptions::default())
        .expect("Failed to start zip entry");
    writer
        .write_all(b"luau-compile")
        .expect("Failed to write zip entry");
    writer
        .finish()
        .expect("Failed to finish zip")
        .into_inner()
}
