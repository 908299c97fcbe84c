use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use meridian_core::{RoleId, TenantId, UserId};
use meridian_rbac::permission::ids;
use meridian_rbac::{AccessEngine, PermissionCatalog, PermissionMatrix, Principal, Role, RoleDraft, RoleKind};
use meridian_store::{InMemoryRoleStore, RoleStore, StoreDirectory};

/// Seed a tenant with `n` custom roles cycling through the catalog, plus the
/// built-in system roles. Returns the id of one mid-pack custom role.
fn seeded_store(n: usize) -> (Arc<InMemoryRoleStore>, TenantId, RoleId) {
    let store = Arc::new(InMemoryRoleStore::new());
    let tenant = TenantId::new();
    let catalog_ids = PermissionCatalog::global().all_ids();

    for kind in RoleKind::TENANT_KINDS {
        store
            .insert(Role::system_role_for_kind(kind, tenant, Utc::now()))
            .unwrap();
    }

    let mut probe = None;
    for i in 0..n {
        let permissions: BTreeSet<_> = catalog_ids
            .iter()
            .skip(i % catalog_ids.len())
            .take(5)
            .cloned()
            .collect();
        let role = Role::from_draft(
            RoleDraft {
                tenant_id: tenant,
                name: format!("Role {i}"),
                description: String::new(),
                permissions,
            },
            Utc::now(),
        )
        .unwrap();
        if i == n / 2 {
            probe = Some(role.id);
        }
        store.insert(role).unwrap();
    }

    (store, tenant, probe.expect("n > 0"))
}

fn bench_permission_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_check_latency");
    group.sample_size(1000);

    let (store, tenant, role_id) = seeded_store(100);
    let engine = AccessEngine::new(StoreDirectory::new(store));

    group.bench_function("by_role_id", |b| {
        let principal = Principal::with_role_id(UserId::new(), tenant, role_id);
        b.iter(|| black_box(engine.has_permission(&principal, black_box(&ids::READ))));
    });

    // Kind-based principals go through the materialized system role.
    group.bench_function("by_role_kind", |b| {
        let principal = Principal::with_kind(UserId::new(), tenant, RoleKind::Agent);
        b.iter(|| black_box(engine.has_permission(&principal, black_box(&ids::MANAGE_TICKETS))));
    });

    group.bench_function("can_manage_user", |b| {
        let caller = Principal::with_kind(UserId::new(), tenant, RoleKind::Admin);
        let target = Principal::with_kind(UserId::new(), tenant, RoleKind::Agent);
        b.iter(|| black_box(engine.can_manage_user(&caller, &target)));
    });

    group.finish();
}

fn bench_matrix_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_build");
    let catalog = PermissionCatalog::global();

    for n in [10usize, 100, 1000] {
        let (store, tenant, _) = seeded_store(n);
        let roles = store.list(tenant).unwrap();
        group.throughput(Throughput::Elements(roles.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &roles, |b, roles| {
            b.iter(|| black_box(PermissionMatrix::build(black_box(roles), catalog)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_permission_checks, bench_matrix_build);
criterion_main!(benches);
