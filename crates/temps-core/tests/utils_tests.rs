use temps_core::utils::mask_sensitive;

#[test]
fn test_mask_sensitive() {
    // Short strings (8 chars or less) should be completely masked
    assert_eq!(mask_sensitive("abc123"), "***");
    assert_eq!(mask_sensitive("12345678"), "***");

    // Longer strings should show first 4 and last 4 chars
    assert_eq!(mask_sensitive("1234567890"), "1234***7890");
    assert_eq!(
        mask_sensitive("e8a1f5c2b7d94a3e9f0c6b1d2a7e4f90"),
        "e8a1***4f90"
    );

    // Empty string
    assert_eq!(mask_sensitive(""), "***");
}

#[test]
fn test_mask_sensitive_multibyte() {
    // Latin-1 decoded agents can carry non-ASCII characters
    assert_eq!(mask_sensitive("ÿÿÿÿkeyÿÿÿÿ"), "ÿÿÿÿ***ÿÿÿÿ");
}
