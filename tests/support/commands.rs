//! Command helper methods for Test.

use std::process::Output;

use assert_cmd::Command;

use super::Test;

impl Test {
    /// A fieldvault command running in the project directory.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("fieldvault").expect("failed to find fieldvault binary");
        cmd.current_dir(self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("FIELDVAULT_LOG");
        cmd
    }

    pub fn init_cmd(&self) -> Output {
        self.cmd()
            .arg("init")
            .output()
            .expect("failed to run fieldvault init")
    }

    pub fn create_key(&self, name: Option<&str>) -> Output {
        let mut cmd = self.cmd();
        cmd.arg("create-key");
        if let Some(name) = name {
            cmd.args(["--name", name]);
        }
        cmd.output().expect("failed to run fieldvault create-key")
    }

    /// `fieldvault encrypt-database --yes` with extra arguments.
    pub fn encrypt(&self, args: &[&str]) -> Output {
        self.cmd()
            .arg("encrypt-database")
            .args(args)
            .arg("--yes")
            .output()
            .expect("failed to run fieldvault encrypt-database")
    }

    pub fn show(&self, table: &str) -> Output {
        self.cmd()
            .args(["show", table])
            .output()
            .expect("failed to run fieldvault show")
    }

    pub fn show_json(&self, table: &str) -> Output {
        self.cmd()
            .args(["show", table, "--json"])
            .output()
            .expect("failed to run fieldvault show --json")
    }

    pub fn status(&self) -> Output {
        self.cmd()
            .arg("status")
            .output()
            .expect("failed to run fieldvault status")
    }
}
