//! Integration tests for lzc-dtl

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs::File;
    use std::io::Read;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ROUTES: &str = r#"[{"type":"http","path":"/","service":"web","port":80}]"#;

    fn dtl(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("lzc-dtl");
        cmd.env_remove("LZC_DTL_REGISTRY")
            .env_remove("RUST_LOG")
            .env("LZC_DTL_CONFIG", temp.path().join("config.json"));
        cmd
    }

    /// A one-service project with packaged content and an icon
    fn project(temp: &TempDir, compose: &str) -> PathBuf {
        let dir = temp.path().join("project");
        std::fs::create_dir_all(dir.join("html")).unwrap();
        std::fs::write(dir.join("html").join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(dir.join("logo.png"), b"\x89PNG").unwrap();
        std::fs::write(dir.join("docker-compose.yml"), compose).unwrap();
        dir
    }

    const WEB: &str = "\
services:
  web:
    image: nginx:1.27
    ports:
      - \"8080:80\"
    volumes:
      - ./html:/usr/share/nginx/html
    environment:
      MODE: prod
";

    fn convert_args(dir: &Path) -> Vec<String> {
        vec![
            "convert".to_string(),
            "-f".to_string(),
            dir.join("docker-compose.yml").display().to_string(),
            "--icon".to_string(),
            dir.join("logo.png").display().to_string(),
            "--non-interactive".to_string(),
        ]
    }

    fn read_member(package: &Path, name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(File::open(package).unwrap()).unwrap();
        let mut bytes = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Convert docker-compose projects into LazyCat application packages",
            ));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("lzc-dtl"));
    }

    #[test]
    fn convert_non_interactive_writes_package() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "false",
                "--multi-instance",
                "false",
                "--routes",
                ROUTES,
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("com.acme.demo.lpk"));

        let package = dir.join("com.acme.demo.lpk");
        assert!(package.is_file());
        assert!(dir.join(".lzc-dtl-cache.json").is_file());

        let manifest = String::from_utf8(read_member(&package, "manifest.yml")).unwrap();
        assert!(manifest.contains("/=http://web.com.acme.demo.lzcapp:80/"));
        assert!(manifest.contains("/lzcapp/pkg/content/html:/usr/share/nginx/html"));
        assert!(manifest.contains("image: nginx:1.27"));
        assert!(manifest.contains("MODE=prod"));

        let content = read_member(&package, "content.tar");
        let mut tar = tar::Archive::new(content.as_slice());
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "html/index.html"));
    }

    #[test]
    fn second_run_uses_cached_answers() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "true",
                "--multi-instance",
                "false",
                "--routes",
                ROUTES,
            ])
            .assert()
            .success();
        let first = read_member(&dir.join("com.acme.demo.lpk"), "manifest.yml");

        dtl(&temp)
            .args(convert_args(&dir))
            .args(["--routes", ROUTES])
            .assert()
            .success();
        let second = read_member(&dir.join("com.acme.demo.lpk"), "manifest.yml");

        assert_eq!(first, second);
    }

    #[test]
    fn convert_output_directory() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);
        let out = temp.path().join("dist");

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "false",
                "--multi-instance",
                "false",
                "--routes",
                ROUTES,
                "--output",
            ])
            .arg(&out)
            .assert()
            .success();

        assert!(out.join("com.acme.demo.lpk").is_file());
        assert!(!dir.join("com.acme.demo.lpk").exists());
    }

    #[test]
    fn non_interactive_requires_answers() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("--name"))
            .stderr(predicate::str::contains("--multi-instance"))
            .stderr(predicate::str::contains("Hint:"));

        assert!(!dir.join("com.acme.demo.lpk").exists());
    }

    #[test]
    fn non_interactive_ports_require_routes() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "false",
                "--multi-instance",
                "false",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--routes"));
    }

    #[test]
    fn non_interactive_push_requires_registry() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "false",
                "--multi-instance",
                "false",
                "--routes",
                ROUTES,
                "--push",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("registry"));

        assert!(!dir.join("com.acme.demo.lpk").exists());
    }

    #[test]
    fn routes_must_name_existing_services() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, WEB);

        dtl(&temp)
            .args(convert_args(&dir))
            .args([
                "--name",
                "Demo",
                "--package",
                "com.acme.demo",
                "--background-task",
                "false",
                "--multi-instance",
                "false",
                "--routes",
                r#"[{"type":"ingress","protocol":"tcp","port":70000,"service":"web"}]"#,
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("70000"));
    }

    #[test]
    fn reserved_service_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, "services:\n  app:\n    image: nginx\n");

        dtl(&temp)
            .args(convert_args(&dir))
            .args(["--name", "Demo", "--package", "com.acme.demo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("reserved"));
    }

    #[test]
    fn compose_without_services_is_a_schema_error() {
        let temp = TempDir::new().unwrap();
        let dir = project(&temp, "version: '3'\n");

        dtl(&temp)
            .args(convert_args(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("services"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.json"));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .args(["config", "set", "registry", "reg.example.com"])
            .assert()
            .success();

        dtl(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"registry\": \"reg.example.com\""));
    }

    #[test]
    fn config_set_unknown_key() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn cache_path_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join(".lzc-dtl-cache.json");
        std::fs::write(&cache, r#"{"push":{"web":false}}"#).unwrap();

        dtl(&temp)
            .args(["cache", "path", "--project"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains(".lzc-dtl-cache.json"));

        dtl(&temp)
            .args(["cache", "show", "--project"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("\"web\": false"));

        dtl(&temp)
            .args(["cache", "clear", "--yes", "--project"])
            .arg(temp.path())
            .assert()
            .success();
        assert!(!cache.exists());
    }

    #[test]
    fn completions_generate() {
        let temp = TempDir::new().unwrap();
        dtl(&temp)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("lzc-dtl"));
    }
}
