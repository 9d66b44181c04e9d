// Obscura — Vault Service
//
// Orchestrates the authorization gate and both stores. Every operation
// authorizes first, then runs one ownership-scoped store call. Store errors
// are reclassified into `VaultError` here and nowhere else, and every
// failure is logged under the service's span before it is returned.

use std::sync::Arc;

use tracing::Span;
use uuid::Uuid;

use crate::credentials::Credentials;
use crate::deadline::Deadline;
use crate::store::{Account, AccountStore, DeleteOutcome, KeyPayload, KeyRecord, KeyStore, StoreError};

use super::gate::{AccountId, AuthorizationGate};
use super::VaultError;

pub struct VaultService {
    gate: AuthorizationGate,
    accounts: Arc<dyn AccountStore>,
    keys: Arc<dyn KeyStore>,
    span: Span,
}

impl VaultService {
    pub fn new(accounts: Arc<dyn AccountStore>, keys: Arc<dyn KeyStore>, span: Span) -> Self {
        Self {
            gate: AuthorizationGate::new(accounts.clone()),
            accounts,
            keys,
            span,
        }
    }

    // ─── Key Records ─────────────────────────────────────────────────────────

    /// Store a client-encrypted record for the authenticated account.
    pub fn add_key(
        &self,
        credentials: &Credentials,
        payload: &KeyPayload,
        deadline: &Deadline,
    ) -> Result<KeyRecord, VaultError> {
        let _entered = self.span.enter();

        let result = self.gate.authorize(credentials, deadline).and_then(|owner| {
            self.keys
                .add(owner.get(), payload, deadline)
                .map_err(|e| match e {
                    // The account vanished after authorization
                    StoreError::MissingOwner(_) => VaultError::Unauthorized,
                    other => VaultError::storage(other),
                })
        });

        self.finish("add_key", result)
    }

    /// All records of the authenticated account, newest first.
    pub fn list_keys(&self, credentials: &Credentials, deadline: &Deadline) -> Result<Vec<KeyRecord>, VaultError> {
        let _entered = self.span.enter();

        let result = self.gate.authorize(credentials, deadline).and_then(|owner| {
            self.keys
                .list(owner.get(), deadline)
                .map_err(VaultError::storage)
        });

        self.finish("list_keys", result)
    }

    /// Remove one record owned by the authenticated account.
    ///
    /// A record owned by someone else is `Unauthorized`; an unknown id is
    /// `NotFound`.
    pub fn delete_key(
        &self,
        record_id: &Uuid,
        credentials: &Credentials,
        deadline: &Deadline,
    ) -> Result<(), VaultError> {
        let _entered = self.span.enter();

        let result = self.gate.authorize(credentials, deadline).and_then(|owner| {
            match self.keys.delete(record_id, owner.get(), deadline) {
                Ok(DeleteOutcome::Deleted) => Ok(()),
                Ok(DeleteOutcome::NotOwned) => Err(VaultError::Unauthorized),
                Ok(DeleteOutcome::Missing) => Err(VaultError::NotFound(record_id.to_string())),
                Err(e) => Err(VaultError::storage(e)),
            }
        });

        self.finish("delete_key", result)
    }

    // ─── Accounts ────────────────────────────────────────────────────────────

    /// Create an account. The address must not already be registered.
    pub fn register(&self, credentials: &Credentials, deadline: &Deadline) -> Result<Account, VaultError> {
        let _entered = self.span.enter();

        let result = self
            .accounts
            .create(credentials.address(), credentials.password(), deadline)
            .map_err(|e| match e {
                StoreError::Conflict(address) => {
                    VaultError::Conflict(format!("address already registered: {}", address))
                }
                other => VaultError::storage(other),
            });

        self.finish("register", result)
    }

    /// Whether the credentials resolve to an account.
    pub fn check_account(&self, credentials: &Credentials, deadline: &Deadline) -> Result<bool, VaultError> {
        let _entered = self.span.enter();

        let result = match self.gate.authorize(credentials, deadline) {
            Ok(_) => Ok(true),
            Err(VaultError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        };

        self.finish("check_account", result)
    }

    /// Replace the password of the authenticated account.
    pub fn change_password(
        &self,
        credentials: &Credentials,
        new_password: &str,
        deadline: &Deadline,
    ) -> Result<(), VaultError> {
        let _entered = self.span.enter();

        let result = if new_password.is_empty() {
            Err(VaultError::InvalidInput("new password must not be empty".into()))
        } else {
            self.gate.authorize(credentials, deadline).and_then(|owner| {
                self.accounts
                    .update_password(owner.get(), new_password, deadline)
                    .map_err(VaultError::storage)
            })
        };

        self.finish("change_password", result)
    }

    /// Delete the authenticated account. Refused while it still owns records.
    pub fn delete_account(&self, credentials: &Credentials, deadline: &Deadline) -> Result<(), VaultError> {
        let _entered = self.span.enter();

        let result = self
            .gate
            .authorize(credentials, deadline)
            .and_then(|owner| self.remove_account(owner, deadline));

        self.finish("delete_account", result)
    }

    fn remove_account(&self, owner: AccountId, deadline: &Deadline) -> Result<(), VaultError> {
        match self.accounts.delete(owner.get(), deadline) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VaultError::NotFound(format!("account {}", owner))),
            Err(StoreError::ForeignKey(_)) => {
                Err(VaultError::Conflict("account still owns key records".into()))
            }
            Err(e) => Err(VaultError::storage(e)),
        }
    }

    /// Log the outcome of `op` and hand the result back unchanged.
    fn finish<T>(&self, op: &'static str, result: Result<T, VaultError>) -> Result<T, VaultError> {
        match &result {
            Ok(_) => tracing::debug!(op, "Vault operation succeeded"),
            Err(VaultError::StorageFailure(detail)) => {
                tracing::error!(op, kind = "STORAGE_FAILURE", %detail, "Vault operation failed")
            }
            Err(e) => tracing::warn!(op, kind = e.code(), "Vault operation rejected"),
        }
        result
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Argon2Hasher;
    use crate::store::{Database, SqliteAccountStore, SqliteKeyStore};
    use std::time::{Duration, Instant};

    fn setup() -> VaultService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let accounts = Arc::new(SqliteAccountStore::new(
            db.clone(),
            Arc::new(Argon2Hasher::for_tests()),
        ));
        let keys = Arc::new(SqliteKeyStore::new(db));
        VaultService::new(accounts, keys, tracing::info_span!("vault_test"))
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn creds(address: &str, password: &str) -> Credentials {
        Credentials::new(address, password).unwrap()
    }

    fn payload(tag: u8) -> KeyPayload {
        KeyPayload {
            encrypted_key: vec![tag; 32],
            key_iv: vec![tag; 12],
            encrypted_data: vec![tag, 0, tag],
            data_iv: vec![tag; 12],
        }
    }

    fn registered(service: &VaultService, address: &str, password: &str) -> Credentials {
        let c = creds(address, password);
        service.register(&c, &deadline()).unwrap();
        c
    }

    // ─── Authorization ───────────────────────────────────────────────────────

    #[test]
    fn test_wrong_password_and_wrong_address_are_indistinguishable() {
        let service = setup();
        registered(&service, "addr1", "pw1");

        let wrong_pw = service.list_keys(&creds("addr1", "nope"), &deadline()).unwrap_err();
        let wrong_addr = service.list_keys(&creds("ghost", "pw1"), &deadline()).unwrap_err();

        assert_eq!(wrong_pw, VaultError::Unauthorized);
        assert_eq!(wrong_pw, wrong_addr);
        assert_eq!(wrong_pw.to_string(), wrong_addr.to_string());
    }

    #[test]
    fn test_add_with_bad_credentials_stores_nothing() {
        let service = setup();
        let good = registered(&service, "addr1", "pw1");

        let err = service
            .add_key(&creds("addr1", "wrong"), &payload(1), &deadline())
            .unwrap_err();
        assert_eq!(err, VaultError::Unauthorized);
        assert!(service.list_keys(&good, &deadline()).unwrap().is_empty());
    }

    #[test]
    fn test_expired_deadline_is_storage_failure() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        let expired = Deadline::at(Instant::now() - Duration::from_millis(1));

        let err = service.list_keys(&c, &expired).unwrap_err();
        assert!(matches!(err, VaultError::StorageFailure(_)));
    }

    // ─── Key Records ─────────────────────────────────────────────────────────

    #[test]
    fn test_list_is_newest_first_and_stable() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");

        let r1 = service.add_key(&c, &payload(1), &deadline()).unwrap();
        let r2 = service.add_key(&c, &payload(2), &deadline()).unwrap();
        let r3 = service.add_key(&c, &payload(3), &deadline()).unwrap();

        let first = service.list_keys(&c, &deadline()).unwrap();
        let second = service.list_keys(&c, &deadline()).unwrap();

        let ids: Vec<Uuid> = first.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![r3.id, r2.id, r1.id]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_records_never_leak_across_accounts() {
        let service = setup();
        let a = registered(&service, "addr-a", "pw-a");
        let b = registered(&service, "addr-b", "pw-b");

        service.add_key(&a, &payload(1), &deadline()).unwrap();
        assert!(service.list_keys(&b, &deadline()).unwrap().is_empty());
    }

    #[test]
    fn test_opaque_fields_roundtrip() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        let sent = KeyPayload {
            encrypted_key: vec![0x00, 0xFF, 0x10, 0x00],
            key_iv: (0..12).collect(),
            encrypted_data: b"\x00not utf8 \xC3\x28".to_vec(),
            data_iv: (100..112).collect(),
        };

        service.add_key(&c, &sent, &deadline()).unwrap();
        let listed = service.list_keys(&c, &deadline()).unwrap();
        assert_eq!(listed[0].payload, sent);
        assert_eq!(listed[0].address, "addr1");
    }

    #[test]
    fn test_delete_removes_exactly_one_record() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        let keep = service.add_key(&c, &payload(1), &deadline()).unwrap();
        let gone = service.add_key(&c, &payload(2), &deadline()).unwrap();

        service.delete_key(&gone.id, &c, &deadline()).unwrap();

        let listed = service.list_keys(&c, &deadline()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
    }

    #[test]
    fn test_delete_unknown_id_is_not_found_and_changes_nothing() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        service.add_key(&c, &payload(1), &deadline()).unwrap();
        let before = service.list_keys(&c, &deadline()).unwrap();

        let err = service.delete_key(&Uuid::new_v4(), &c, &deadline()).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
        assert_eq!(service.list_keys(&c, &deadline()).unwrap(), before);
    }

    #[test]
    fn test_delete_twice_fails_second_time() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        let record = service.add_key(&c, &payload(1), &deadline()).unwrap();

        service.delete_key(&record.id, &c, &deadline()).unwrap();
        let err = service.delete_key(&record.id, &c, &deadline()).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn test_delete_foreign_record_is_unauthorized() {
        let service = setup();
        let a = registered(&service, "addr-a", "pw-a");
        let b = registered(&service, "addr-b", "pw-b");
        let record = service.add_key(&a, &payload(1), &deadline()).unwrap();

        let err = service.delete_key(&record.id, &b, &deadline()).unwrap_err();
        assert_eq!(err, VaultError::Unauthorized);
        assert_eq!(service.list_keys(&a, &deadline()).unwrap().len(), 1);
    }

    #[test]
    fn test_full_scenario() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");

        let record = service.add_key(&c, &payload(9), &deadline()).unwrap();
        let listed = service.list_keys(&c, &deadline()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);

        let err = service.list_keys(&creds("addr1", "wrong"), &deadline()).unwrap_err();
        assert_eq!(err, VaultError::Unauthorized);

        service.delete_key(&record.id, &c, &deadline()).unwrap();
        assert!(service.list_keys(&c, &deadline()).unwrap().is_empty());
    }

    // ─── Accounts ────────────────────────────────────────────────────────────

    #[test]
    fn test_register_duplicate_is_conflict() {
        let service = setup();
        registered(&service, "addr1", "pw1");

        let err = service.register(&creds("addr1", "other"), &deadline()).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
    }

    #[test]
    fn test_check_account() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");

        assert!(service.check_account(&c, &deadline()).unwrap());
        assert!(!service.check_account(&creds("addr1", "pw2"), &deadline()).unwrap());
    }

    /// Account store that resolves every pair to one fixed id.
    struct FixedIdStore(i64);

    impl AccountStore for FixedIdStore {
        fn create(&self, _: &str, _: &str, _: &Deadline) -> Result<Account, StoreError> {
            unreachable!()
        }
        fn resolve_id(&self, _: &str, _: &str, _: &Deadline) -> Result<Option<i64>, StoreError> {
            Ok(Some(self.0))
        }
        fn update_password(&self, _: i64, _: &str, _: &Deadline) -> Result<(), StoreError> {
            unreachable!()
        }
        fn delete(&self, _: i64, _: &Deadline) -> Result<bool, StoreError> {
            unreachable!()
        }
    }

    fn service_with_store(store: FixedIdStore) -> VaultService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let keys = Arc::new(SqliteKeyStore::new(db));
        VaultService::new(Arc::new(store), keys, tracing::info_span!("vault_test"))
    }

    #[test]
    fn test_check_account_agrees_with_authorization() {
        // A non-positive id is not an account, whatever the store says
        let service = service_with_store(FixedIdStore(0));
        let c = creds("addr1", "pw1");

        assert!(!service.check_account(&c, &deadline()).unwrap());
        assert_eq!(service.list_keys(&c, &deadline()).unwrap_err(), VaultError::Unauthorized);

        let service = service_with_store(FixedIdStore(7));
        assert!(service.check_account(&c, &deadline()).unwrap());
    }

    #[test]
    fn test_check_account_with_expired_deadline_is_storage_failure() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");

        let expired = Deadline::at(Instant::now() - Duration::from_millis(1));
        let err = service.check_account(&c, &expired).unwrap_err();
        assert!(matches!(err, VaultError::StorageFailure(_)));
    }

    #[test]
    fn test_change_password() {
        let service = setup();
        let old = registered(&service, "addr1", "pw1");

        service.change_password(&old, "pw2", &deadline()).unwrap();

        assert!(!service.check_account(&old, &deadline()).unwrap());
        assert!(service.check_account(&creds("addr1", "pw2"), &deadline()).unwrap());
    }

    #[test]
    fn test_change_password_requires_current_credentials() {
        let service = setup();
        registered(&service, "addr1", "pw1");

        let err = service
            .change_password(&creds("addr1", "guess"), "pw2", &deadline())
            .unwrap_err();
        assert_eq!(err, VaultError::Unauthorized);
    }

    #[test]
    fn test_change_password_rejects_empty() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");

        let err = service.change_password(&c, "", &deadline()).unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
        assert!(service.check_account(&c, &deadline()).unwrap());
    }

    #[test]
    fn test_delete_account_with_records_is_conflict() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        let record = service.add_key(&c, &payload(1), &deadline()).unwrap();

        let err = service.delete_account(&c, &deadline()).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));

        service.delete_key(&record.id, &c, &deadline()).unwrap();
        service.delete_account(&c, &deadline()).unwrap();
        assert!(!service.check_account(&c, &deadline()).unwrap());
    }

    #[test]
    fn test_deleted_account_loses_access() {
        let service = setup();
        let c = registered(&service, "addr1", "pw1");
        service.delete_account(&c, &deadline()).unwrap();

        let err = service.add_key(&c, &payload(1), &deadline()).unwrap_err();
        assert_eq!(err, VaultError::Unauthorized);
    }
}
