//! Phase 2 tests: record loading and the record writer.

mod common;

use std::sync::Arc;

use kvmodel::engine::Db;
use kvmodel::schema::{Attribute, Registry, TypeBuilder};
use kvmodel::store::{Batch, Store};
use kvmodel::types::{Handle, ModelError, ObjectId, Record, Value};

use common::{create_user, db, user, user_fields};

// ==================== Create + Load ====================

#[test]
fn test_create_assigns_counter_ids() {
    let db = db();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let bob = create_user(&db, "bob", "bob@example.com", 25, "Rome");

    assert_eq!(ann.id(), Some(ObjectId::new(1)));
    assert_eq!(bob.id(), Some(ObjectId::new(2)));
    assert_eq!(ann.key().as_deref(), Some("User:1"));
    assert_eq!(
        db.store().hget("User:1", "username").unwrap().as_deref(),
        Some("ann")
    );
    assert_eq!(db.store().hget("User:2", "active").unwrap().as_deref(), Some("1"));
}

#[test]
fn test_load_round_trip() {
    let db = db();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let handle = ann.handle().unwrap();

    let loaded = handle.load(&db).unwrap();
    assert_eq!(loaded.id(), ann.id());
    for (name, value) in user_fields("ann", "ann@example.com", 30, "Oslo") {
        assert_eq!(loaded.get(name).unwrap(), &value, "attribute {}", name);
    }
    assert_eq!(loaded.indexed_value("username"), Some("ann"));
    assert_eq!(loaded.indexed_value("age"), Some("30"));
    assert_eq!(loaded.indexed_value("active"), None);
    assert_eq!(loaded.container("tags").unwrap().key(), "User:1:tags");
}

#[test]
fn test_load_missing_is_not_found() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    assert!(matches!(
        db.load(&db.by_id(&desc, 99u64)),
        Err(ModelError::NotFound(_))
    ));
    assert!(matches!(
        db.load(&Handle::new("User", ObjectId::NONE)),
        Err(ModelError::NotFound(_))
    ));
    assert!(matches!(
        db.load(&Handle::new("Ghost", ObjectId::new(1))),
        Err(ModelError::BadArgs(_))
    ));
}

#[test]
fn test_load_partial_record_is_corruption() {
    let db = db();
    let mut batch = Batch::new();
    batch.hset("User:5", vec![("username".into(), "eve".into())]);
    db.store().exec(batch).unwrap();

    let desc = db.descriptor("User").unwrap();
    let err = db.load(&db.by_id(&desc, 5u64)).unwrap_err();
    assert!(matches!(err, ModelError::DataCorruption { .. }), "{}", err);
}

#[test]
fn test_load_unparsable_attribute_is_corruption() {
    let db = db();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let mut batch = Batch::new();
    batch.hset("User:1", vec![("age".into(), "thirty".into())]);
    db.store().exec(batch).unwrap();

    assert!(matches!(
        ann.handle().unwrap().load(&db),
        Err(ModelError::DataCorruption { .. })
    ));
}

#[test]
fn test_exists_and_by_id() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    assert!(!db.exists(&desc, 1u64).unwrap());
    create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    assert!(db.exists(&desc, 1u64).unwrap());
    assert_eq!(db.by_id(&desc, 1u64), Handle::new("User", ObjectId::new(1)));
}

// ==================== Record construction ====================

#[test]
fn test_record_new_validates_fields() {
    let db = db();
    let desc = db.descriptor("User").unwrap();

    let mut missing = user_fields("ann", "a@x", 1, "Oslo");
    missing.pop();
    assert!(matches!(Record::new(&desc, missing), Err(ModelError::BadArgs(_))));

    let mut extra = user_fields("ann", "a@x", 1, "Oslo");
    extra.push(("nickname", Value::from("annie")));
    assert!(matches!(Record::new(&desc, extra), Err(ModelError::BadArgs(_))));

    let mut twice = user_fields("ann", "a@x", 1, "Oslo");
    twice.push(("email", Value::from("b@x")));
    assert!(matches!(Record::new(&desc, twice), Err(ModelError::BadArgs(_))));

    let mut wrong = user_fields("ann", "a@x", 1, "Oslo");
    wrong[2] = ("age", Value::from("old"));
    assert!(matches!(Record::new(&desc, wrong), Err(ModelError::BadArgs(_))));
}

#[test]
fn test_record_set_and_rendering() {
    let db = db();
    let mut ann = user(&db, "ann", "ann@example.com", 30, "Oslo");
    assert!(!ann.is_persisted());
    assert!(ann.handle().is_none());
    assert!(matches!(ann.container("tags"), Err(ModelError::BadArgs(_))));

    ann.set("age", 31i64).unwrap();
    assert!(matches!(ann.set("age", "x"), Err(ModelError::BadArgs(_))));
    assert!(matches!(ann.set("nope", 1i64), Err(ModelError::BadArgs(_))));

    let dict = ann.to_dict();
    assert_eq!(dict["age"], "31");
    assert_eq!(dict["active"], "1");

    let json = ann.to_json();
    assert_eq!(json["username"], "ann");
    assert_eq!(json["age"], 31);
    assert_eq!(json["active"], true);

    let desc = db.descriptor("User").unwrap();
    db.writer(&desc).unwrap().create(&mut ann, None).unwrap();
    assert!(ann.to_string().starts_with("<User:1 {"));
}

// ==================== Update ====================

#[test]
fn test_update_moves_indexes() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "old@example.com", 30, "Oslo");
    let handle = ann.handle().unwrap();

    writer
        .update(&mut ann, [("email", Value::from("new@example.com"))])
        .unwrap();
    assert_eq!(ann.get("email").unwrap(), &Value::from("new@example.com"));
    assert_eq!(ann.indexed_value("email"), Some("new@example.com"));

    assert!(db.multifind(&desc, "email", "old@example.com").unwrap().is_empty());
    assert!(db
        .multifind(&desc, "email", "new@example.com")
        .unwrap()
        .contains(&handle));

    let loaded = handle.load(&db).unwrap();
    assert_eq!(loaded.get("email").unwrap(), &Value::from("new@example.com"));
    assert_eq!(loaded.get("age").unwrap(), &Value::Int(30));
}

#[test]
fn test_update_rejects_bad_fields_before_writing() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    let err = writer
        .update(
            &mut ann,
            [("email", Value::from("x@example.com")), ("shoe", Value::from(9i64))],
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::BadArgs(_)));
    let err = writer
        .update(&mut ann, [("age", Value::from("x"))])
        .unwrap_err();
    assert!(matches!(err, ModelError::BadArgs(_)));
    let no_fields: [(&str, Value); 0] = [];
    assert!(matches!(
        writer.update(&mut ann, no_fields),
        Err(ModelError::BadArgs(_))
    ));

    let loaded = ann.handle().unwrap().load(&db).unwrap();
    assert_eq!(loaded.get("email").unwrap(), &Value::from("ann@example.com"));
    assert_eq!(ann.get("email").unwrap(), &Value::from("ann@example.com"));
}

#[test]
fn test_update_requires_persisted_record() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = user(&db, "ann", "ann@example.com", 30, "Oslo");
    assert!(matches!(
        writer.update(&mut ann, [("age", Value::from(1i64))]),
        Err(ModelError::BadArgs(_))
    ));
    assert!(matches!(writer.update_all(&mut ann), Err(ModelError::BadArgs(_))));
    assert!(matches!(writer.delete(&mut ann), Err(ModelError::BadArgs(_))));
}

#[test]
fn test_update_all_persists_set_values() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let handle = ann.handle().unwrap();

    ann.set("city", "Rome").unwrap();
    ann.set("active", false).unwrap();
    writer.update_all(&mut ann).unwrap();

    let loaded = handle.load(&db).unwrap();
    assert_eq!(loaded.get("city").unwrap(), &Value::from("Rome"));
    assert_eq!(loaded.get("active").unwrap(), &Value::Bool(false));
    assert!(db.getlist(&desc, "city", "Oslo", 0, -1).unwrap().is_empty());
    assert_eq!(db.getlist(&desc, "city", "Rome", 0, -1).unwrap(), vec![handle]);
}

// ==================== Uniqueness ====================

#[test]
fn test_create_unique_conflict_leaves_state_unchanged() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    let mut copycat = user(&db, "ann", "copy@example.com", 20, "Rome");
    let err = writer.create(&mut copycat, None).unwrap_err();
    match err {
        ModelError::Conflict { key, value, holder } => {
            assert_eq!(key, "u:User:username");
            assert_eq!(value, "ann");
            assert_eq!(holder, "1");
        }
        other => panic!("expected conflict, got {}", other),
    }
    assert!(!copycat.is_persisted());
    assert!(!db.store().exists("User:2").unwrap());
    assert!(db.multifind(&desc, "email", "copy@example.com").unwrap().is_empty());
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), ann.handle());

    // The failed create consumed id 2.
    let bob = create_user(&db, "bob", "bob@example.com", 25, "Rome");
    assert_eq!(bob.id(), Some(ObjectId::new(3)));
}

#[test]
fn test_update_unique_conflict() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let mut bob = create_user(&db, "bob", "bob@example.com", 25, "Rome");

    let err = writer
        .update(&mut bob, [("username", Value::from("ann")), ("age", Value::from(99i64))])
        .unwrap_err();
    assert!(matches!(err, ModelError::Conflict { .. }));
    assert_eq!(bob.get("username").unwrap(), &Value::from("bob"));
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), ann.handle());
    assert_eq!(db.find(&desc, "username", "bob").unwrap(), bob.handle());
    let loaded = bob.handle().unwrap().load(&db).unwrap();
    assert_eq!(loaded.get("age").unwrap(), &Value::Int(25));
}

#[test]
fn test_rename_frees_old_unique_value() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    writer
        .update(&mut ann, [("username", Value::from("anne"))])
        .unwrap();
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), None);
    assert_eq!(db.find(&desc, "username", "anne").unwrap(), ann.handle());

    let newcomer = create_user(&db, "ann", "new@example.com", 20, "Oslo");
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), newcomer.handle());
}

#[test]
fn test_rewriting_own_unique_value_is_not_a_conflict() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    writer
        .update(&mut ann, [("username", Value::from("ann"))])
        .unwrap();
    writer.update_all(&mut ann).unwrap();
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), ann.handle());
}

// ==================== Delete ====================

#[test]
fn test_delete_removes_record_and_indexes() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let handle = ann.handle().unwrap();

    writer.delete(&mut ann).unwrap();
    assert!(!ann.is_persisted());
    assert!(matches!(handle.load(&db), Err(ModelError::NotFound(_))));
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), None);
    assert!(db.multifind(&desc, "email", "ann@example.com").unwrap().is_empty());
    assert!(db.getlist(&desc, "city", "Oslo", 0, -1).unwrap().is_empty());
    assert_eq!(db.zrank(&desc, "age", &handle).unwrap(), None);
    assert_eq!(db.zrank(&desc, "joined", &handle).unwrap(), None);

    // Only the id counter is left behind.
    let store = db.store();
    assert!(!store.exists("u:User:username").unwrap());
    assert!(!store.exists("z:User:age").unwrap());
    assert!(store.exists("User:id_counter").unwrap());
}

#[test]
fn test_delete_of_already_deleted_record() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    let mut first = ann.handle().unwrap().load(&db).unwrap();
    let mut second = ann.handle().unwrap().load(&db).unwrap();
    writer.delete(&mut first).unwrap();
    assert!(matches!(writer.delete(&mut second), Err(ModelError::NotFound(_))));
    assert!(second.is_persisted());
}

#[test]
fn test_update_of_deleted_record_is_not_found() {
    let db = db();
    let desc = db.descriptor("User").unwrap();
    let writer = db.writer(&desc).unwrap();
    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let handle = ann.handle().unwrap();

    let mut first = handle.load(&db).unwrap();
    let mut second = handle.load(&db).unwrap();
    writer.delete(&mut first).unwrap();

    assert!(matches!(
        writer.update(&mut second, [("email", Value::from("z@example.com"))]),
        Err(ModelError::NotFound(_))
    ));
    assert!(matches!(writer.update_all(&mut second), Err(ModelError::NotFound(_))));
    assert_eq!(second.get("email").unwrap(), &Value::from("ann@example.com"));
    assert!(!db.store().exists("User:1").unwrap());
    assert!(db.multifind(&desc, "email", "z@example.com").unwrap().is_empty());
    assert!(db.multifind(&desc, "email", "ann@example.com").unwrap().is_empty());
    assert_eq!(db.find(&desc, "username", "ann").unwrap(), None);
    assert!(matches!(handle.load(&db), Err(ModelError::NotFound(_))));
}

// ==================== Shared identity ====================

#[test]
fn test_owned_type_adopts_owner_id() {
    let db = db();
    let profile_desc = db.descriptor("Profile").unwrap();
    let profiles = db.writer(&profile_desc).unwrap();
    create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let bob = create_user(&db, "bob", "bob@example.com", 25, "Rome");
    let bob_handle = bob.handle().unwrap();

    let mut profile = Record::new(&profile_desc, [("bio", Value::from("hi"))]).unwrap();
    let handle = profiles.create(&mut profile, Some(&bob_handle)).unwrap();
    assert_eq!(handle.id(), ObjectId::new(2));
    assert_eq!(handle.key(), "Profile:2");
    assert!(!db.store().exists("Profile:id_counter").unwrap());
    assert_eq!(db.by_owner(&profile_desc, &bob_handle).unwrap(), handle);
    assert_eq!(
        db.by_owner(&profile_desc, &bob_handle)
            .unwrap()
            .load(&db)
            .unwrap()
            .get("bio")
            .unwrap(),
        &Value::from("hi")
    );

    let mut again = Record::new(&profile_desc, [("bio", Value::from("again"))]).unwrap();
    assert!(matches!(
        profiles.create(&mut again, Some(&bob_handle)),
        Err(ModelError::BadArgs(_))
    ));
}

#[test]
fn test_owner_preconditions() {
    let db = db();
    let profile_desc = db.descriptor("Profile").unwrap();
    let user_desc = db.descriptor("User").unwrap();
    let profiles = db.writer(&profile_desc).unwrap();
    let mut profile = Record::new(&profile_desc, [("bio", Value::from("hi"))]).unwrap();

    assert!(matches!(profiles.create(&mut profile, None), Err(ModelError::BadArgs(_))));
    let post = Handle::new("Post", ObjectId::new(1));
    assert!(matches!(
        profiles.create(&mut profile, Some(&post)),
        Err(ModelError::BadArgs(_))
    ));
    let unsaved = Handle::new("User", ObjectId::NONE);
    assert!(matches!(
        profiles.create(&mut profile, Some(&unsaved)),
        Err(ModelError::BadArgs(_))
    ));
    let ghost = Handle::new("User", ObjectId::new(42));
    assert!(matches!(
        profiles.create(&mut profile, Some(&ghost)),
        Err(ModelError::NotFound(_))
    ));
    assert!(!profile.is_persisted());

    let ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");
    let mut other = user(&db, "bob", "bob@example.com", 25, "Rome");
    assert!(matches!(
        db.writer(&user_desc)
            .unwrap()
            .create(&mut other, ann.handle().as_ref()),
        Err(ModelError::BadArgs(_))
    ));
    assert!(matches!(
        db.by_owner(&user_desc, &ann.handle().unwrap()),
        Err(ModelError::BadArgs(_))
    ));
}

// ==================== Writer preconditions ====================

#[test]
fn test_writer_preconditions() {
    let db = db();
    let user_desc = db.descriptor("User").unwrap();
    let post_desc = db.descriptor("Post").unwrap();
    let mut ann = create_user(&db, "ann", "ann@example.com", 30, "Oslo");

    assert!(matches!(
        db.writer(&user_desc).unwrap().create(&mut ann, None),
        Err(ModelError::BadArgs(_))
    ));
    assert!(matches!(
        db.writer(&post_desc).unwrap().update_all(&mut ann),
        Err(ModelError::BadArgs(_))
    ));

    let mut foreign = Registry::new();
    let stray = foreign
        .register(TypeBuilder::new("User").attribute(Attribute::string("username")))
        .unwrap();
    assert!(matches!(db.writer(&stray), Err(ModelError::BadArgs(_))));
}

#[test]
fn test_shared_store_between_databases() {
    common::init_logging();
    let store: Arc<dyn Store> = Arc::new(kvmodel::store::MemoryStore::new());
    let first = Db::new(store.clone(), common::registry());
    let second = Db::new(store, common::registry());

    let ann = create_user(&first, "ann", "ann@example.com", 30, "Oslo");
    let desc = second.descriptor("User").unwrap();
    assert_eq!(second.find(&desc, "username", "ann").unwrap(), ann.handle());

    let mut dup = user(&second, "ann", "dup@example.com", 1, "Oslo");
    assert!(matches!(
        second.writer(&desc).unwrap().create(&mut dup, None),
        Err(ModelError::Conflict { .. })
    ));
}
