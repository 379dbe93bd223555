use devicehub_core::{Database, Store};
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("devicehub/devicehub.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("devicehub");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(assert_cmd::cargo::cargo_bin!("devicehub"))
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("RUST_LOG")
            .output()
            .unwrap_or_else(|e| panic!("failed to execute devicehub: {e}"))
    }

    /// Run a command that must succeed and parse its stdout.
    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert_success(args, &output);
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({e}):\n{}",
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    /// Run a command that must fail and return (exit code, error code).
    fn failure(&self, args: &[&str]) -> (i32, String) {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "devicehub {} unexpectedly succeeded",
            args.join(" ")
        );
        let envelope: Value = serde_json::from_slice(&output.stderr).unwrap_or_else(|e| {
            panic!(
                "stderr is not a JSON envelope ({e}):\n{}",
                String::from_utf8_lossy(&output.stderr)
            )
        });
        let code = envelope["error"]["code"]
            .as_str()
            .expect("envelope without code")
            .to_string();
        assert!(envelope["error"]["message"].is_string());
        (output.status.code().expect("killed by signal"), code)
    }
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "devicehub {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("record without id").to_string()
}

#[test]
fn register_and_fetch_device_in_xdg_database() {
    let env = CliTestEnv::new();

    let device = env.json(&["device", "register", "SN-0001"]);
    assert_eq!(device["serial_number"], "SN-0001");
    let device_id = id_of(&device);

    let fetched = env.json(&["device", "get", &device_id]);
    assert_eq!(fetched["id"], device_id.as_str());
    assert_eq!(fetched["users"], Value::Array(vec![]));

    let listed = env.json(&["device", "list"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );
    let db = Database::open(&db_path).expect("failed to open db");
    assert_eq!(db.counts().expect("failed to count").devices, 1);
}

#[test]
fn duplicate_serial_is_a_conflict() {
    let env = CliTestEnv::new();
    env.json(&["device", "register", "SN-0001"]);

    assert_eq!(
        env.failure(&["device", "register", "SN-0001"]),
        (3, "DUPLICATE_SERIAL_NUMBER".to_string())
    );
}

#[test]
fn shape_validation_rejects_bad_input() {
    let env = CliTestEnv::new();

    assert_eq!(
        env.failure(&["device", "register", "AB"]),
        (2, "INVALID_INPUT".to_string())
    );
    assert_eq!(
        env.failure(&["user", "create", "a"]),
        (2, "INVALID_INPUT".to_string())
    );
    assert_eq!(
        env.failure(&["device", "get", "not-a-uuid"]),
        (2, "INVALID_INPUT".to_string())
    );

    let device = env.json(&["device", "register", "SN-0001"]);
    let device_id = id_of(&device);
    assert_eq!(
        env.failure(&["device", "stats", &device_id, "--start", "yesterday"]),
        (2, "INVALID_INPUT".to_string())
    );
    assert_eq!(
        env.failure(&["device", "measure", &device_id, "1", "NaN", "3"]),
        (2, "INVALID_MEASUREMENT".to_string())
    );
}

#[test]
fn missing_records_report_not_found() {
    let env = CliTestEnv::new();
    let unknown = "01890a5d-ac96-774b-bcce-b302099a8057";

    assert_eq!(
        env.failure(&["device", "list"]),
        (4, "DEVICE_NOT_FOUND".to_string())
    );
    assert_eq!(
        env.failure(&["device", "stats", unknown]),
        (4, "DEVICE_NOT_FOUND".to_string())
    );
    assert_eq!(
        env.failure(&["user", "get", unknown]),
        (4, "USER_NOT_FOUND".to_string())
    );

    let device = env.json(&["device", "register", "SN-0001"]);
    assert_eq!(
        env.failure(&["device", "stats", &id_of(&device)]),
        (4, "MEASUREMENT_NOT_FOUND".to_string())
    );
    assert_eq!(
        env.failure(&["device", "measurements", &id_of(&device)]),
        (4, "MEASUREMENT_NOT_FOUND".to_string())
    );
}

#[test]
fn empty_device_list_can_be_configured_as_success() {
    let env = CliTestEnv::new();
    env.write_config("[devices]\nempty_list_is_error = false\n");

    let listed = env.json(&["device", "list"]);
    assert_eq!(listed, Value::Array(vec![]));
}

#[test]
fn measurements_and_device_stats() {
    let env = CliTestEnv::new();
    let device_id = id_of(&env.json(&["device", "register", "SN-0001"]));

    for (x, y, z) in [("1", "10", "-1"), ("2", "20", "-2"), ("3", "30", "-3.5")] {
        let m = env.json(&["device", "measure", &device_id, x, y, z]);
        assert_eq!(m["device_id"], device_id.as_str());
        assert!(m["timestamp"].is_string());
    }

    let measurements = env.json(&["device", "measurements", &device_id]);
    let xs: Vec<f64> = measurements
        .as_array()
        .expect("measurements array")
        .iter()
        .map(|m| m["x"].as_f64().expect("x"))
        .collect();
    assert_eq!(xs, vec![3.0, 2.0, 1.0]);

    let stats = env.json(&["device", "stats", &device_id]);
    assert_eq!(stats["device_id"], device_id.as_str());
    assert_eq!(stats["x"]["count"], 3);
    assert_eq!(stats["x"]["median"], 2.0);
    assert_eq!(stats["y"]["sum"], 60.0);
    assert_eq!(stats["z"]["min"], -3.5);
    assert_eq!(stats["period"]["start"], Value::Null);

    let future = env.failure(&[
        "device",
        "stats",
        &device_id,
        "--start",
        "2999-01-01T00:00:00Z",
    ]);
    assert_eq!(future, (4, "MEASUREMENT_NOT_FOUND".to_string()));
}

#[test]
fn user_links_and_aggregated_stats() {
    let env = CliTestEnv::new();
    let user_id = id_of(&env.json(&["user", "create", "ada"]));
    assert_eq!(
        env.failure(&["user", "create", "ada"]),
        (3, "USER_ALREADY_EXISTS".to_string())
    );

    let first = id_of(&env.json(&["device", "register", "SN-0001"]));
    let second = id_of(&env.json(&["device", "register", "SN-0002"]));

    let linked = env.json(&["device", "link", &first, &user_id]);
    assert_eq!(linked["users"][0]["name"], "ada");
    env.json(&["device", "link", &second, &user_id]);
    assert_eq!(
        env.failure(&["device", "link", &first, &user_id]),
        (3, "USER_ALREADY_LINKED".to_string())
    );

    env.json(&["device", "measure", &first, "1", "0", "0"]);
    env.json(&["device", "measure", &first, "3", "0", "0"]);
    env.json(&["device", "measure", &second, "5", "0", "0"]);

    let users = env.json(&["device", "users", &first]);
    assert_eq!(users.as_array().map(Vec::len), Some(1));

    let user = env.json(&["user", "get", &user_id]);
    assert_eq!(user["devices"].as_array().map(Vec::len), Some(2));

    let aggregated = env.json(&["user", "stats", &user_id]);
    assert_eq!(aggregated["total_devices"], 2);
    assert_eq!(aggregated["total_measurements"], 3);
    assert_eq!(aggregated["stats"]["x"]["count"], 3);
    assert_eq!(aggregated["stats"]["x"]["sum"], 9.0);
    assert_eq!(aggregated["stats"]["x"]["median"], 3.0);

    let per_device = env.json(&["user", "stats", &user_id, "--per-device"]);
    let devices = per_device["devices"].as_array().expect("devices array");
    assert_eq!(devices.len(), 2);
    let first_stats = devices
        .iter()
        .find(|d| d["device_id"] == first.as_str())
        .expect("first device stats");
    assert_eq!(first_stats["stats"]["x"]["median"], 2.0);
}

#[test]
fn delete_device_cascades_and_status_reports_counts() {
    let env = CliTestEnv::new();
    let user_id = id_of(&env.json(&["user", "create", "ada"]));
    let device_id = id_of(&env.json(&["device", "register", "SN-0001"]));
    env.json(&["device", "link", &device_id, &user_id]);
    env.json(&["device", "measure", &device_id, "1", "2", "3"]);

    let status = env.json(&["status"]);
    assert_eq!(status["counts"]["measurements"], 1);
    assert_eq!(status["counts"]["links"], 1);
    assert_eq!(status["schema_version"], 1);
    let log_dir = PathBuf::from(status["log_dir"].as_str().expect("log_dir"));
    assert_eq!(log_dir, env.xdg_state.join("devicehub"));
    assert!(log_dir.is_dir());

    let deleted = env.json(&["device", "delete", &device_id]);
    assert_eq!(deleted["deleted"], true);
    assert_eq!(
        env.failure(&["device", "delete", &device_id]),
        (4, "DEVICE_NOT_FOUND".to_string())
    );

    let status = env.json(&["status"]);
    assert_eq!(status["counts"]["devices"], 0);
    assert_eq!(status["counts"]["measurements"], 0);
    assert_eq!(status["counts"]["links"], 0);
    assert_eq!(status["counts"]["users"], 1);
}

#[test]
fn db_flag_overrides_default_location() {
    let env = CliTestEnv::new();
    let custom = env.home.join("custom/devices.db");
    let custom_arg = custom.to_string_lossy().into_owned();

    env.json(&["--db", &custom_arg, "device", "register", "SN-0001"]);

    assert!(custom.exists());
    assert!(!env.db_path().exists());
}
