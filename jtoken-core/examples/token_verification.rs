use jtoken_core::{
    generate_hash, get_token_payload, validate_token, AlgorithmType, Claims, ExpireMode,
    JsonKeyStore, Key, KeyResolver, TokenBuilder, TokenError, TokenValidator,
};
use serde_json::json;

fn main() -> Result<(), TokenError> {
    let mut claims = Claims::new();
    claims.insert("sub".to_string(), json!("alice"));
    claims.insert("resource".to_string(), json!("resource1"));

    // Example 1: Shared secret
    println!("Example 1: Shared secret");
    let token = TokenBuilder::new()
        .secret("shared-secret")
        .algorithm(AlgorithmType::HS256)
        .expire_mode(ExpireMode::Strict)
        .payload(claims.clone())
        .make_token()?;
    println!("Generated token: {}", token);

    let valid = validate_token(&token, Some("shared-secret"), None, None)?;
    println!("✅ Valid with the right secret: {}", valid);
    let valid = validate_token(&token, Some("wrong-secret"), None, None)?;
    println!("❌ Valid with the wrong secret: {}\n", valid);

    // Example 2: Key registry
    println!("Example 2: Key registry");
    let key_id = generate_hash("kid_", 32, AlgorithmType::HS256)?;
    let registry = format!(
        r#"[
            {{"id": "{key_id}", "key": "registry-secret", "revoked": false, "expires": null}},
            {{"id": "retired", "key": "old-secret", "revoked": true}}
        ]"#
    );
    let store = JsonKeyStore::from_json_str(&registry)?;
    let key = store.get_key_by_id(&key_id)?;

    let token = TokenBuilder::new()
        .secret(&key)
        .expires_period("+2 hours")?
        .payload(claims.clone())
        .make_token()?;
    println!("Payload: {}", serde_json::Value::Object(get_token_payload(&token)?));

    let valid = TokenValidator::new().with_resolver(&store).validate(&token)?;
    println!("✅ Valid against the registry: {}\n", valid);

    // Example 3: Revoked key
    println!("Example 3: Revoked key");
    let retired: Key = store.get_key_by_id("retired")?;
    let token = TokenBuilder::new().secret(retired).payload(claims).make_token()?;
    let valid = TokenValidator::new().with_resolver(&store).validate(&token)?;
    println!("❌ Valid with a revoked key: {}\n", valid);

    // Example 4: Resolver wiring mismatch
    println!("Example 4: Resolver wiring mismatch");
    match validate_token(&token, Some("old-secret"), None, None) {
        Err(e) if e.is_resolution_mismatch() => println!("✅ Rejected: {}", e),
        other => println!("Unexpected result: {:?}", other),
    }

    Ok(())
}
