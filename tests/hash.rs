use les_rpc::Core::{hash, hash_case_sensitive, INVALID_HASH};

#[test]
fn case_sensitive_known_values() {
    assert_eq!(hash_case_sensitive(""), 0);
    assert_eq!(hash_case_sensitive("a"), 97);
    assert_eq!(hash_case_sensitive("jake"), 1863425725);
    assert_eq!(hash_case_sensitive("rowan"), 3756861831);
    assert_eq!(hash_case_sensitive("Jake"), 8686429);
    assert_eq!(hash_case_sensitive("JAKE"), 3881405);
}

#[test]
fn builtin_type_names() {
    assert_eq!(hash_case_sensitive("int"), 15768431);
    assert_eq!(hash_case_sensitive("short"), 10895628);
    assert_eq!(hash_case_sensitive("float"), 700713896);
    assert_eq!(hash_case_sensitive("float*"), 593338146);
    assert_eq!(hash_case_sensitive("void"), 2561048952);
    assert_eq!(hash_case_sensitive("jakeInit"), 3580373261);
}

#[test]
fn case_insensitive_folds_case_and_slashes() {
    assert_eq!(hash("Jake"), 1863425725);
    assert_eq!(hash("JAKE"), hash("jake"));
    assert_eq!(hash("Dir\\File.txt"), 2792788392);
    assert_eq!(hash("Dir\\File.txt"), hash("dir/file.txt"));
    assert_eq!(hash_case_sensitive("Dir\\File.txt"), 1244288565);
}

#[test]
fn engineered_collision_is_a_real_collision() {
    assert_ne!("jzhieuv", "vhdqqql");
    assert_eq!(hash_case_sensitive("jzhieuv"), 1172671749);
    assert_eq!(hash_case_sensitive("vhdqqql"), 1172671749);
}

#[test]
fn invalid_hash_marker() {
    assert_eq!(INVALID_HASH, u32::MAX);
    assert_ne!(hash_case_sensitive("jake"), INVALID_HASH);
}
