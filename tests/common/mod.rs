//! Shared fixture: a re-rooted host whose command backend behaves like a
//! cooperative Debian machine.
//!
//! - downloads write plausible files (manifests list the tarballs already
//!   fetched into the same directory, with their real SHA-256)
//! - every pinned signer is already in the keyring
//! - signature checks report two distinct good signers
//! - `install` drops an empty file where the binary would land
//! - `syncthing generate` writes a stock config.xml

#![allow(dead_code)]

use rlvpn::engine::{Progress, ProgressBoard, Reporter};
use rlvpn::trust::signers::{BITCOIN_CORE_SIGNERS, LIT_SIGNERS, LND_SIGNERS, RLVPN_SIGNERS};
use rlvpn::testing::RecordingExec;
use rlvpn::{AppConfig, CancelToken, Host, Layout, Plan, Runner, StateStore};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

pub const TRIXIE: &str = "ID=debian\nVERSION_ID=\"13\"\nVERSION_CODENAME=trixie\n";

pub const TWO_GOOD: &str = "[GNUPG:] NEWSIG\n\
[GNUPG:] GOODSIG 944D35F9AC3DB76A fanquake\n\
[GNUPG:] VALIDSIG E777299FC265DD04793070EB944D35F9AC3DB76A\n\
[GNUPG:] NEWSIG\n\
[GNUPG:] GOODSIG 17565732E08E5E41 achow101\n";

const SYNCTHING_GENERATED: &str = "<configuration version=\"37\">\n    <gui enabled=\"true\" tls=\"false\" debugging=\"false\">\n        <address>127.0.0.1:8384</address>\n        <apikey>generated</apikey>\n    </gui>\n</configuration>\n";

pub struct FakeNode {
    pub dir: tempfile::TempDir,
    pub exec: Arc<RecordingExec>,
    pub host: Host,
}

fn keyring_listing() -> String {
    BITCOIN_CORE_SIGNERS
        .iter()
        .chain(LND_SIGNERS)
        .chain(LIT_SIGNERS)
        .chain(RLVPN_SIGNERS)
        .map(|s| format!("pub:-:4096:1::1:::-:::scESC::::::23::0:\nfpr:::::::::{}:\n", s.fingerprint))
        .collect()
}

fn write_download(dest: &Path) {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let body = if name.ends_with(".tar.gz") {
        format!("tarball {name}").into_bytes()
    } else if name == "SHA256SUMS" || (name.starts_with("manifest-") && name.ends_with(".txt")) {
        let mut manifest = String::new();
        for entry in fs::read_dir(dest.parent().unwrap()).unwrap() {
            let path = entry.unwrap().path();
            let file = path.file_name().unwrap().to_string_lossy().into_owned();
            if file.ends_with(".tar.gz") {
                let hash = hex::encode(Sha256::digest(fs::read(&path).unwrap()));
                manifest.push_str(&format!("{hash}  {file}\n"));
            }
        }
        manifest.into_bytes()
    } else {
        b"-----BEGIN PGP SIGNATURE-----\n".to_vec()
    };
    fs::write(dest, body).unwrap();
}

impl FakeNode {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(RecordingExec::default());
        let host = Host::new(Runner::new(exec.clone()), Layout::rooted(dir.path()));

        host.write("/etc/os-release", TRIXIE, 0o644).unwrap();

        exec.on_run("wget", |spec| write_download(Path::new(&spec.args[2])));
        exec.respond("gpg --batch --with-colons --list-keys", &keyring_listing());
        exec.respond("gpg --batch --status-fd 1 --verify", TWO_GOOD);
        exec.on_run("install -m 0755", |spec| {
            let n = spec.args.len();
            let src = Path::new(&spec.args[n - 2]);
            let bin_dir = PathBuf::from(&spec.args[n - 1]);
            fs::create_dir_all(&bin_dir).unwrap();
            fs::write(bin_dir.join(src.file_name().unwrap()), b"").unwrap();
        });
        exec.on_run("sudo -u bitcoin /usr/bin/syncthing generate", |spec| {
            let config = spec
                .args
                .iter()
                .find_map(|a| a.strip_prefix("--config="))
                .unwrap();
            fs::create_dir_all(config).unwrap();
            fs::write(Path::new(config).join("config.xml"), SYNCTHING_GENERATED).unwrap();
        });

        Self { dir, exec, host }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn read(&self, canonical: &str) -> String {
        self.host.read(canonical).unwrap()
    }

    pub fn store(&self) -> StateStore {
        StateStore::for_layout(self.host.layout())
    }

    pub fn saved(&self) -> AppConfig {
        self.store().load().unwrap()
    }

    /// Pretend LND already created its wallet for `cfg`'s network
    pub fn create_wallet(&self, cfg: &AppConfig) {
        let db = rlvpn::layout::lnd_wallet_db(&cfg.network_config());
        self.host.write(&db, "", 0o600).unwrap();
    }

    /// Run `plan` to completion, collecting every progress message.
    pub fn run(&self, plan: Plan) -> (rlvpn::Result<AppConfig>, Vec<Progress>) {
        let (reporter, rx) = Reporter::channel();
        let result = rlvpn::execute(plan, &self.host, &reporter, &CancelToken::new());
        drop(reporter);
        (result, drain(&rx))
    }

    /// Run `plan` and fold its messages into a board.
    pub fn run_board(&self, plan: Plan) -> (rlvpn::Result<AppConfig>, ProgressBoard) {
        let mut board = ProgressBoard::new(plan.kind.to_string(), plan.step_names());
        let (result, messages) = self.run(plan);
        for msg in &messages {
            board.apply(msg);
        }
        (result, board)
    }
}

pub fn drain(rx: &Receiver<Progress>) -> Vec<Progress> {
    rx.try_iter().collect()
}
