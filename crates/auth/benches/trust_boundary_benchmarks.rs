use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Duration, Utc};
use tenantgate_auth::policy::{action_matches, resource_matches};
use tenantgate_auth::{IdentityClaims, TokenCodec, TokenKind};
use tenantgate_core::{RoleCode, TenantId, TokenId, UserId};

fn claims() -> IdentityClaims {
    let now = Utc::now();
    IdentityClaims {
        tenant_id: TenantId::from("acme"),
        user_id: UserId::from("u1"),
        role_id: RoleCode::from("editor"),
        roles: vec![RoleCode::from("editor"), RoleCode::from("viewer")],
        token_id: TokenId::generate(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + Duration::hours(2)).timestamp(),
        iss: Some("tenantgate".into()),
    }
}

/// Signature verification runs on every authenticated request.
fn bench_codec(c: &mut Criterion) {
    let codec = TokenCodec::new(b"access-secret-access-secret-0001", b"refresh-secret-refresh-secret-01")
        .with_issuer("tenantgate");
    let claims = claims();
    let token = codec.encode(TokenKind::Access, &claims).unwrap();

    let mut group = c.benchmark_group("token_codec");
    group.bench_function("encode_access", |b| {
        b.iter(|| codec.encode(TokenKind::Access, black_box(&claims)).unwrap())
    });
    group.bench_function("decode_access", |b| {
        b.iter(|| codec.decode(TokenKind::Access, black_box(&token), Utc::now()).unwrap())
    });
    group.finish();
}

fn bench_matcher(c: &mut Criterion) {
    let cases = [
        ("exact", "/rbac/bindings", "/rbac/bindings"),
        ("param", "/rbac/users/:user_id/roles", "/rbac/users/u1/roles"),
        ("prefix", "/docs/*", "/docs/2024/reports/q3/summary"),
        ("miss", "/docs/*", "/documents/2024/reports/q3/summary"),
    ];

    let mut group = c.benchmark_group("policy_matcher");
    for (name, pattern, path) in cases {
        group.bench_with_input(BenchmarkId::new("resource", name), &(pattern, path), |b, (p, r)| {
            b.iter(|| resource_matches(black_box(p), black_box(r)))
        });
    }
    group.bench_function("action_alternation", |b| {
        b.iter(|| action_matches(black_box("GET|HEAD|OPTIONS"), black_box("options")))
    });
    group.finish();
}

criterion_group!(benches, bench_codec, bench_matcher);
criterion_main!(benches);
