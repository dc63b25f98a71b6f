use super::*;

fn hex16(s: &str) -> [u8; 16] {
    let bytes = hex::decode(s).expect("valid hex");
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes);
    out
}

// RFC 4493 Section 4 test vectors.
#[test]
fn aes_cmac_rfc4493_empty_message() {
    let key = hex16("2b7e151628aed2a6abf7158809cf4f3c");
    let mac_empty = aes_cmac(&key, &[]);
    assert_eq!(mac_empty, hex16("bb1d6929e95937287fa37d129b756746"));
}

#[test]
fn aes_cmac_rfc4493_16_byte_message() {
    let key = hex16("2b7e151628aed2a6abf7158809cf4f3c");
    let msg = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    let mac = aes_cmac(&key, &msg);
    assert_eq!(mac, hex16("070a16b46b4d4144f79bdd9dd04a287c"));
}

#[test]
fn aes128_be_matches_known_vector() {
    // FIPS-197 Appendix B vector.
    let key = hex16("000102030405060708090a0b0c0d0e0f");
    let plaintext = hex16("00112233445566778899aabbccddeeff");
    let ct = aes128_be(&key, &plaintext);
    assert_eq!(ct, hex16("69c4e0d86a7b0430d8cdb78070b4c55a"));
}

#[test]
fn c1_is_deterministic_and_role_sensitive() {
    let k = [0u8; 16];
    let r = [0x11u8; 16];
    let preq = [0x01u8; 7];
    let pres = [0x02u8; 7];
    let ia = [0xAAu8; 6];
    let ra = [0xBBu8; 6];

    let v1 = c1(&k, &r, &preq, &pres, 0, 0, &ia, &ra);
    let v2 = c1(&k, &r, &preq, &pres, 0, 0, &ia, &ra);
    assert_eq!(v1, v2, "c1 must be a pure function of its inputs");

    let v3 = c1(&k, &r, &preq, &pres, 1, 0, &ia, &ra);
    assert_ne!(v1, v3, "address type must affect the confirm value");
}

#[test]
fn s1_matches_manual_input_assembly() {
    let k = [0x5Au8; 16];
    let srand = [0x01u8; 16];
    let mrand = [0x02u8; 16];
    let r = s1_input(&srand, &mrand);
    assert_eq!(&r[0..8], &srand[0..8]);
    assert_eq!(&r[8..16], &mrand[0..8]);

    let stk = s1(&k, &r);
    assert_eq!(stk, s1(&k, &r), "s1 must be deterministic");
}

#[test]
fn f4_symmetry_both_sides_compute_same_confirm() {
    let u = [0x10u8; 32];
    let v = [0x20u8; 32];
    let x = [0x30u8; 16];
    let z = 0x00;

    let confirm_initiator = f4(&u, &v, &x, z);
    let confirm_responder = f4(&u, &v, &x, z);
    assert_eq!(confirm_initiator, confirm_responder);

    let confirm_different_z = f4(&u, &v, &x, 0x80);
    assert_ne!(confirm_initiator, confirm_different_z);
}

#[test]
fn f5_derives_distinct_mackey_and_ltk() {
    let w = [0x42u8; 32];
    let n1 = [0x01u8; 16];
    let n2 = [0x02u8; 16];
    let a1 = [0x00; 7];
    let a2 = [0x01; 7];

    let (mac_key, ltk) = f5(&w, &n1, &n2, &a1, &a2);
    assert_ne!(mac_key, ltk, "MacKey and LTK use different counter octets");

    let (mac_key2, ltk2) = f5(&w, &n2, &n1, &a1, &a2);
    assert_ne!(mac_key, mac_key2, "swapping N1/N2 must change the derived keys");
}

#[test]
fn f6_depends_on_every_input() {
    let w = [0x01u8; 16];
    let n1 = [0x02u8; 16];
    let n2 = [0x03u8; 16];
    let r = [0x04u8; 16];
    let io_cap = [0x01, 0x00, 0x00];
    let a1 = [0x00; 7];
    let a2 = [0x01; 7];

    let base = f6(&w, &n1, &n2, &r, &io_cap, &a1, &a2);
    let flipped_iocap = f6(&w, &n1, &n2, &r, &[0x02, 0x00, 0x00], &a1, &a2);
    assert_ne!(base, flipped_iocap);
}

#[test]
fn g2_result_is_a_six_digit_value() {
    let u = [0x01u8; 32];
    let v = [0x02u8; 32];
    let x = [0x03u8; 16];
    let y = [0x04u8; 16];

    let value = g2(&u, &v, &x, &y);
    assert!(value < 1_000_000);
}

#[test]
fn h6_ctkd_directions_diverge() {
    let ltk = [0x77u8; 16];
    let le_to_bredr = ctkd_link_key(&ltk, true);
    let bredr_to_le = ctkd_link_key(&ltk, false);
    assert_ne!(le_to_bredr, bredr_to_le);
}

#[test]
fn rpa_generate_then_resolve_round_trips() {
    let irk = [0x5Cu8; 16];
    let prand = [0x01, 0x02, 0x03];

    let addr = generate_rpa(&irk, prand);
    assert_eq!(addr[5] & 0xC0, 0x40, "RPA top bits must be 01");
    assert!(resolve_rpa(addr, &irk));

    let wrong_irk = [0x00u8; 16];
    assert!(!resolve_rpa(addr, &wrong_irk));
}

#[test]
fn rpa_resolve_rejects_non_resolvable_address() {
    let irk = [0x11u8; 16];
    // Static random address: top two bits 11, not 01.
    let static_addr = [0x01, 0x02, 0x03, 0x04, 0x05, 0xC6];
    assert!(!resolve_rpa(static_addr, &irk));
}
