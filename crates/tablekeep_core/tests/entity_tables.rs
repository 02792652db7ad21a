use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use tablekeep_core::entity::{
    bootstrap_all, EntityTables, NewPlayerChar, NewTimedLimit, PlayerCharPatch, PlayerCharType,
    TimedLimitPatch, TimedLimitStatus,
};
use tablekeep_core::{CodecError, StoreConfig, StoreError};
use tempfile::TempDir;

fn open_store() -> (TempDir, StoreConfig, EntityTables) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::with_data_dir(dir.path().join("dbs"));
    let tables = bootstrap_all(&config).unwrap();
    (dir, config, tables)
}

fn character(cid: i64, name: &str) -> NewPlayerChar {
    NewPlayerChar {
        cid,
        name: name.to_string(),
        char_type: PlayerCharType::Norm,
        content_ids: vec!["c-1".to_string(), "c-2".to_string()],
        discord_url: None,
        game_db_id: None,
    }
}

#[test]
fn bootstrap_all_creates_one_file_per_table() {
    let (_dir, config, tables) = open_store();

    assert_eq!(
        tables.table_names(),
        [
            "access_db",
            "credentials_db",
            "note_db",
            "player_char_db",
            "timed_limit"
        ]
    );
    for name in tables.table_names() {
        assert!(config.db_path(name).exists(), "missing file for {name}");
    }

    // Second start against the same directory is a no-op.
    drop(tables);
    bootstrap_all(&config).unwrap();
}

#[test]
fn access_flags_roundtrip_and_update() {
    let (_dir, _config, tables) = open_store();

    let mut flags = BTreeMap::new();
    flags.insert("x".to_string(), true);
    tables.access.create(7, Some(&flags)).unwrap();
    tables.access.create(8, None).unwrap();
    tables.flush_all().unwrap();

    let record = tables.access.get(7).unwrap().unwrap();
    assert_eq!(record.cid, 7);
    assert_eq!(record.access, flags);
    assert!(tables.access.get(8).unwrap().unwrap().access.is_empty());

    let mut replaced = BTreeMap::new();
    replaced.insert("y".to_string(), false);
    tables.access.update(7, Some(&replaced)).unwrap();
    tables.access.update(7, None).unwrap();
    tables.flush_all().unwrap();

    assert_eq!(tables.access.get(7).unwrap().unwrap().access, replaced);

    tables.access.delete(7).unwrap();
    tables.flush_all().unwrap();
    assert!(tables.access.get(7).unwrap().is_none());
}

#[test]
fn credentials_lookup_and_dirty_flag() {
    let (_dir, _config, tables) = open_store();

    tables.credentials.create("discord-1", None).unwrap();
    tables.flush_all().unwrap();
    let created = tables
        .credentials
        .get_by_discord("discord-1")
        .unwrap()
        .unwrap();
    assert!(created.dirty);
    assert_eq!(created.steam64_id, None);

    tables
        .credentials
        .update(created.id, None, Some("7656119"))
        .unwrap();
    tables.credentials.clear_dirty(created.id).unwrap();
    tables.flush_all().unwrap();

    let updated = tables.credentials.get_by_steam("7656119").unwrap().unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.discord_id, "discord-1");
    assert!(!updated.dirty);

    tables.credentials.set_dirty(created.id).unwrap();
    tables.flush_all().unwrap();
    assert!(tables.credentials.get_by_id(created.id).unwrap().unwrap().dirty);
}

#[test]
fn duplicate_discord_id_keeps_first_credential() {
    let (_dir, _config, tables) = open_store();

    tables.credentials.create("dup", Some("first")).unwrap();
    tables.credentials.create("dup", Some("second")).unwrap();
    tables.flush_all().unwrap();

    let record = tables.credentials.get_by_discord("dup").unwrap().unwrap();
    assert_eq!(record.steam64_id.as_deref(), Some("first"));
    assert!(tables.credentials.get_by_steam("second").unwrap().is_none());
}

#[test]
fn notes_list_by_owner_in_creation_order() {
    let (_dir, _config, tables) = open_store();

    tables.notes.create(1, "warn", "first").unwrap();
    tables.notes.create(2, "info", "other owner").unwrap();
    tables.notes.create(1, "info", "second").unwrap();
    tables.flush_all().unwrap();

    let notes = tables.notes.list_by_owner(1).unwrap();
    let messages = notes.iter().map(|note| note.msg.as_str()).collect::<Vec<_>>();
    assert_eq!(messages, ["first", "second"]);
    assert_eq!(notes[0].kind, "warn");

    tables.notes.delete(notes[0].uid).unwrap();
    tables.flush_all().unwrap();
    assert!(tables.notes.get(notes[0].uid).unwrap().is_none());
    assert_eq!(tables.notes.list_by_owner(1).unwrap().len(), 1);
}

#[test]
fn player_char_create_patch_and_list() {
    let (_dir, _config, tables) = open_store();

    tables.player_chars.create(&character(3, "Ash")).unwrap();
    tables.player_chars.create(&character(3, "Birch")).unwrap();
    tables.flush_all().unwrap();

    let listed = tables.player_chars.list_by_owner(3).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "Ash");
    assert_eq!(listed[0].content_ids, ["c-1", "c-2"]);
    assert_eq!(listed[0].char_type, PlayerCharType::Norm);

    let uid = listed[0].uid;
    tables
        .player_chars
        .update(
            uid,
            &PlayerCharPatch {
                char_type: Some(PlayerCharType::Lore),
                content_ids: Some(Vec::new()),
                game_db_id: Some(42),
                ..PlayerCharPatch::default()
            },
        )
        .unwrap();
    tables
        .player_chars
        .update(uid, &PlayerCharPatch::default())
        .unwrap();
    tables.flush_all().unwrap();

    let patched = tables.player_chars.get(uid).unwrap().unwrap();
    assert_eq!(patched.name, "Ash");
    assert_eq!(patched.char_type, PlayerCharType::Lore);
    assert!(patched.content_ids.is_empty());
    assert_eq!(patched.game_db_id, Some(42));
    assert_eq!(patched.discord_url, None);
}

#[test]
fn unknown_char_type_label_is_a_decoding_error() {
    let (_dir, config, tables) = open_store();

    let conn = Connection::open(config.db_path("player_char_db")).unwrap();
    conn.execute(
        "INSERT INTO player_char_db (cid, name, char_type, content_ids) VALUES (?1, ?2, ?3, ?4)",
        params![4, "Cedar", "villain", "[]"],
    )
    .unwrap();
    drop(conn);

    let err = tables.player_chars.list_by_owner(4).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Decoding {
            ref column,
            source: CodecError::UnknownLabel { .. },
            ..
        } if column == "char_type"
    ));
}

#[test]
fn timed_limits_sorted_by_expiry() {
    let (_dir, _config, tables) = open_store();

    for (expired, slots) in [(300, 1), (100, 2), (200, 3)] {
        tables
            .timed_limits
            .create(&NewTimedLimit {
                cid: 9,
                char_slot: slots,
                weight_bytes: 1024,
                expired,
                status: TimedLimitStatus::Active,
            })
            .unwrap();
    }
    tables.flush_all().unwrap();

    let limits = tables.timed_limits.list_by_owner(9).unwrap();
    let expiries = limits.iter().map(|limit| limit.expired).collect::<Vec<_>>();
    assert_eq!(expiries, [100, 200, 300]);

    let soonest = limits[0].uid;
    tables
        .timed_limits
        .update(
            soonest,
            &TimedLimitPatch {
                status: Some(TimedLimitStatus::Expired),
                ..TimedLimitPatch::default()
            },
        )
        .unwrap();
    tables.flush_all().unwrap();

    let record = tables.timed_limits.get(soonest).unwrap().unwrap();
    assert_eq!(record.status, TimedLimitStatus::Expired);
    assert_eq!(record.char_slot, 2);
    assert_eq!(record.weight_bytes, 1024);
}
