use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use xgpsave::archive::{create_zip, write_zip};
use xgpsave::extract::{ExtractError, Extractor};
use xgpsave::fs::StdFs;
use xgpsave::handler::HandlerRegistry;
use xgpsave::notify::{Acknowledgement, RecordingNotifier, SyncWarning};
use xgpsave::reader::Guid;
use xgpsave::wgs::{wgs_dir, ReadError};

const PACKAGE: &str = "Vendor.SomeGame_abc123";
const USER_DIR: &str = "0009000001A2B3C4_0000000000000000000000006A1B2C3D";

// ── Fixture builders ─────────────────────────────────────────────────────────

fn put_str(buf: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    buf.write_i32::<LittleEndian>(units.len() as i32).unwrap();
    for u in units {
        buf.write_u16::<LittleEndian>(u).unwrap();
    }
}

fn hex(b: u8) -> String {
    Guid::from_bytes_le([b; 16]).to_hex_upper()
}

/// containers: (name, number, guid byte)
fn index_bytes(package: &str, containers: &[(&str, u8, u8)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(14).unwrap();
    buf.write_i32::<LittleEndian>(containers.len() as i32).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
    put_str(&mut buf, &format!("{package}!App"));
    buf.write_u64::<LittleEndian>(133_500_000_000_000_000).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
    put_str(&mut buf, "");
    buf.write_u64::<LittleEndian>(0).unwrap();
    for (name, number, guid) in containers {
        put_str(&mut buf, name);
        put_str(&mut buf, name);
        put_str(&mut buf, "\"0x8DC1234567890AB\"");
        buf.push(*number);
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.extend([*guid; 16]);
        buf.write_u64::<LittleEndian>(133_500_000_000_000_000).unwrap();
        buf.extend([0u8; 16]);
    }
    buf
}

/// rows: (file name, primary guid byte, secondary guid byte)
fn container_bytes(rows: &[(&str, u8, u8)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(4).unwrap();
    buf.write_i32::<LittleEndian>(rows.len() as i32).unwrap();
    for (name, a, b) in rows {
        let mut field: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        field.resize(128, 0);
        buf.extend(field);
        buf.extend([*a; 16]);
        buf.extend([*b; 16]);
    }
    buf
}

struct Store {
    root: TempDir,
}

impl Store {
    fn new(containers: &[(&str, u8, u8)]) -> Self {
        let root = TempDir::new().unwrap();
        let store = Store { root };
        fs::create_dir_all(store.user()).unwrap();
        fs::write(store.user().join("containers.index"), index_bytes(PACKAGE, containers)).unwrap();
        store
    }

    fn packages(&self) -> &Path {
        self.root.path()
    }

    fn user(&self) -> PathBuf {
        wgs_dir(self.packages(), PACKAGE).join(USER_DIR)
    }

    fn container(&self, guid: u8, number: u8, rows: &[(&str, u8, u8)]) -> &Self {
        let dir = self.user().join(hex(guid));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("container.{number}")), container_bytes(rows)).unwrap();
        self
    }

    fn blob(&self, container: u8, blob: u8, data: &[u8]) -> &Self {
        fs::write(self.user().join(hex(container)).join(hex(blob)), data).unwrap();
        self
    }
}

fn registry(handler: &str, args: &str) -> HandlerRegistry {
    let json = format!(
        r#"[{{"name": "Some Game", "package": "{PACKAGE}", "handler": "{handler}", "handler_args": {args}}}]"#
    );
    HandlerRegistry::from_json(json.as_bytes()).unwrap()
}

fn contents(fs: &StdFs, saves: &xgpsave::extract::UserSaves) -> Vec<(String, Vec<u8>)> {
    saves
        .artifacts
        .iter()
        .map(|a| (a.relative_path.clone(), a.read(fs).unwrap().into_owned()))
        .collect()
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

#[test]
fn test_one_container_one_file_pipeline() {
    let store = Store::new(&[("slot1", 1, 0x10), ("slot2", 3, 0x20)]);
    store
        .container(0x10, 1, &[("data", 0x11, 0x11)])
        .blob(0x10, 0x11, b"first slot")
        .container(0x20, 3, &[("data", 0x21, 0x22)])
        .blob(0x20, 0x22, b"second slot");

    let registry = registry("1c1f", r#"{"suffix": ".sav"}"#);
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);

    let games = extractor.installed_games();
    assert_eq!(games.len(), 1);
    let mut rec = RecordingNotifier::default();
    let users = extractor.users(games[0], &mut rec).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, 0x0009_0000_01A2_B3C4);

    let saves = extractor.extract_user(&users[0], &mut rec).unwrap();
    assert!(rec.warnings.is_empty());
    assert_eq!(saves.store.store_package_name, PACKAGE);
    assert_eq!(saves.label, users[0].user_id.to_string());
    assert_eq!(
        contents(&disk, &saves),
        vec![
            ("slot1.sav".to_string(), b"first slot".to_vec()),
            ("slot2.sav".to_string(), b"second slot".to_vec()),
        ]
    );
}

#[test]
fn test_sync_problems_degrade_without_failing() {
    // slot2 has no container table; slot1 has one missing and one ambiguous file.
    let store = Store::new(&[("slot1", 1, 0x10), ("slot2", 1, 0x20)]);
    store
        .container(0x10, 1, &[("a", 0x11, 0x11), ("b", 0x12, 0x13), ("c", 0x14, 0x15)])
        .blob(0x10, 0x11, b"kept")
        .blob(0x10, 0x14, b"one")
        .blob(0x10, 0x15, b"two");

    let registry = registry("1cnf-folder", "{}");
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let users = extractor.users(&registry.games()[0], &mut RecordingNotifier::default()).unwrap();
    let user = &users[0];

    let mut rec = RecordingNotifier::default();
    let saves = extractor.extract_user(user, &mut rec).unwrap();
    assert_eq!(contents(&disk, &saves), vec![("slot1/a".to_string(), b"kept".to_vec())]);
    assert_eq!(rec.warnings.len(), 3);
    assert!(matches!(&rec.warnings[0], SyncWarning::MissingFile { container, file }
        if container == "slot1" && file == "b"));
    assert!(matches!(&rec.warnings[1], SyncWarning::AmbiguousFile { file, .. } if file == "c"));
    assert!(matches!(&rec.warnings[2], SyncWarning::MissingContainer { container } if container == "slot2"));
}

#[test]
fn test_abort_stops_the_user() {
    let store = Store::new(&[("slot1", 1, 0x10)]);
    let registry = registry("1c1f", "{}");
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let users = extractor.users(&registry.games()[0], &mut RecordingNotifier::default()).unwrap();
    let user = &users[0];

    let mut abort = |_: &SyncWarning| Acknowledgement::Abort;
    let err = extractor.extract_user(user, &mut abort).unwrap_err();
    assert!(err.is_aborted());
}

#[test]
fn test_truncated_index_fails_only_that_user() {
    let store = Store::new(&[("slot1", 1, 0x10)]);
    let bytes = index_bytes(PACKAGE, &[("slot1", 1, 0x10)]);
    fs::write(store.user().join("containers.index"), &bytes[..bytes.len() - 20]).unwrap();

    let other = wgs_dir(store.packages(), PACKAGE).join("00090000000000FF_0000000000000000000000006A1B2C3D");
    fs::create_dir_all(other.join(hex(0x30))).unwrap();
    fs::write(other.join("containers.index"), index_bytes(PACKAGE, &[("only", 1, 0x30)])).unwrap();
    fs::write(other.join(hex(0x30)).join("container.1"), container_bytes(&[("x", 0x31, 0x31)])).unwrap();
    fs::write(other.join(hex(0x30)).join(hex(0x31)), b"ok").unwrap();

    let registry = registry("1c1f", "{}");
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let mut rec = RecordingNotifier::default();
    let users = extractor.users(&registry.games()[0], &mut rec).unwrap();
    assert_eq!(users.len(), 2);

    let results: Vec<_> = users.iter().map(|u| extractor.extract_user(u, &mut rec)).collect();
    let failed = results.iter().filter(|r| matches!(r, Err(ExtractError::Read(ReadError::Decode { .. })))).count();
    assert_eq!(failed, 1);
    let ok: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(ok.len(), 1);
    assert_eq!(ok[0].artifacts[0].relative_path, "only");
}

#[test]
fn test_unknown_package_in_index() {
    let store = Store::new(&[]);
    let json = format!(r#"[{{"name": "Other", "package": "{PACKAGE}", "handler": "1c1f"}}]"#);
    let mut registry = HandlerRegistry::from_json(json.as_bytes()).unwrap();
    let disk = StdFs;
    fs::write(store.user().join("containers.index"), index_bytes("Vendor.Renamed_zzz", &[])).unwrap();

    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let users = extractor.users(&registry.games()[0], &mut RecordingNotifier::default()).unwrap();
    let user = &users[0];
    let err = extractor.extract_user(user, &mut RecordingNotifier::default()).unwrap_err();
    assert!(matches!(err, ExtractError::Handler(_)));

    registry = HandlerRegistry::new(Vec::new());
    assert!(Extractor::new(&disk, store.packages(), &registry).installed_games().is_empty());
}

#[test]
fn test_starfield_reassembly_from_disk() {
    let store = Store::new(&[("Saves/Save1.sfs", 1, 0x40), ("Settings/Options", 1, 0x50)]);
    store
        .container(0x40, 1, &[("BETHESDAPFH", 0x41, 0x41), ("P0P", 0x42, 0x42), ("P1P", 0x43, 0x43)])
        .blob(0x40, 0x41, &[b'H'; 20])
        .blob(0x40, 0x42, &[b'A'; 16])
        .blob(0x40, 0x43, &[b'B'; 3])
        .container(0x50, 1, &[("options", 0x51, 0x51)])
        .blob(0x50, 0x51, b"ignored");

    let registry = registry("starfield", "{}");
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let users = extractor.users(&registry.games()[0], &mut RecordingNotifier::default()).unwrap();
    let user = &users[0];
    let saves = extractor.extract_user(user, &mut RecordingNotifier::default()).unwrap();

    let files = contents(&disk, &saves);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "Save1.sfs");
    let mut expected = vec![b'H'; 20];
    expected.extend(b"padding\0padding\0"[..12].iter());
    expected.extend([b'A'; 16]);
    expected.extend([b'B'; 3]);
    assert_eq!(files[0].1, expected);
}

// ── Archive ──────────────────────────────────────────────────────────────────

#[test]
fn test_zip_contains_every_artifact() {
    let store = Store::new(&[("slot1", 1, 0x10)]);
    store
        .container(0x10, 1, &[("save", 0x11, 0x11), ("meta", 0x12, 0x12)])
        .blob(0x10, 0x11, b"save bytes")
        .blob(0x10, 0x12, b"meta bytes");

    let registry = registry("1cnf-folder", "{}");
    let disk = StdFs;
    let extractor = Extractor::new(&disk, store.packages(), &registry);
    let users = extractor.users(&registry.games()[0], &mut RecordingNotifier::default()).unwrap();
    let user = &users[0];
    let saves = extractor.extract_user(user, &mut RecordingNotifier::default()).unwrap();

    let out = TempDir::new().unwrap();
    let path = out.path().join("some_game_user.zip");
    create_zip(&path, &saves.artifacts, &disk).unwrap();
    // Existing files are never overwritten.
    assert!(create_zip(&path, &saves.artifacts, &disk).is_err());

    let mut zip = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(zip.len(), 2);
    let mut data = String::new();
    zip.by_name("slot1/meta").unwrap().read_to_string(&mut data).unwrap();
    assert_eq!(data, "meta bytes");
}

#[test]
fn test_write_zip_to_temp_file() {
    let artifacts = vec![xgpsave::SaveArtifact::bytes("a.sav", b"abc".to_vec())];
    let temp_file = NamedTempFile::new().unwrap();
    write_zip(temp_file.reopen().unwrap(), &artifacts, &StdFs).unwrap();

    let mut zip = zip::ZipArchive::new(File::open(temp_file.path()).unwrap()).unwrap();
    assert_eq!(zip.by_index(0).unwrap().name(), "a.sav");
}
