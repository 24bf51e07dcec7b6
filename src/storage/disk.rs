use crate::core::{AuthError, AuthState};
use crate::storage::journal::{JournalManager, Operation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SNAPSHOT_FILE: &str = "auth_state.image";
const DEFAULT_SNAPSHOT_THRESHOLD: usize = 100;

/// Snapshot на диске: состояние и номер последней вошедшей в него операции
#[derive(Serialize, Deserialize)]
struct Snapshot {
    last_sequence: u64,
    state: AuthState,
}

pub struct StorageEngine {
    data_dir: PathBuf,
    journal: JournalManager,
    /// Счетчик операций с момента последнего snapshot
    operations_since_snapshot: usize,
    /// Порог операций для создания нового snapshot
    snapshot_threshold: usize,
}

impl StorageEngine {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, AuthError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let journal = JournalManager::new(&data_dir)?;

        Ok(Self {
            data_dir,
            journal,
            operations_since_snapshot: 0,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
        })
    }

    /// Задает порог операций между snapshot (0 отключает автоматические snapshot)
    #[must_use]
    pub const fn with_snapshot_threshold(mut self, threshold: usize) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn save_snapshot(&self, state: &AuthState, last_sequence: u64) -> Result<(), AuthError> {
        let snapshot = SnapshotRef {
            last_sequence,
            state,
        };
        let encoded = bincode::serialize(&snapshot)
            .map_err(|e| AuthError::BinarySerialization(e.to_string()))?;

        // пишем во временный файл и переименовываем, чтобы не оставить половину snapshot
        let tmp_path = self.data_dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp_path, encoded)?;
        fs::rename(tmp_path, self.data_dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, AuthError> {
        let path = self.data_dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path)?;
        let snapshot = bincode::deserialize(&data)
            .map_err(|e| AuthError::BinarySerialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Загружает состояние: snapshot + операции журнала после него.
    ///
    /// Без snapshot начинает с `AuthState::initialize(root_user)`.
    pub fn load_state(&mut self, root_user: &str) -> Result<AuthState, AuthError> {
        let (mut state, last_sequence) = match self.load_snapshot()? {
            Some(snapshot) => (snapshot.state, snapshot.last_sequence),
            None => (AuthState::initialize(root_user), 0),
        };
        self.journal.ensure_sequence_at_least(last_sequence);

        let mut replayed = 0usize;
        for entry in self.journal.read_all_logs()? {
            if entry.sequence <= last_sequence
                || matches!(entry.operation, Operation::Checkpoint { .. })
            {
                continue;
            }
            if let Err(e) = state.apply(&entry.operation) {
                warn!(sequence = entry.sequence, error = %e, "failed to replay journal entry");
                continue;
            }
            replayed += 1;
        }

        self.operations_since_snapshot = replayed;
        info!(
            data_dir = %self.data_dir.display(),
            last_sequence,
            replayed,
            "authorization state loaded"
        );
        Ok(state)
    }

    /// Записывает успешно примененную операцию в журнал
    pub fn log(&mut self, operation: Operation) -> Result<u64, AuthError> {
        let sequence = self.journal.append(operation)?;
        self.operations_since_snapshot += 1;
        Ok(sequence)
    }

    /// Проверяет нужен ли checkpoint
    #[must_use]
    pub const fn should_checkpoint(&self) -> bool {
        self.snapshot_threshold > 0 && self.operations_since_snapshot >= self.snapshot_threshold
    }

    /// Создает checkpoint только при достижении порога операций
    pub fn maybe_checkpoint(&mut self, state: &AuthState) -> Result<bool, AuthError> {
        if !self.should_checkpoint() {
            return Ok(false);
        }
        self.checkpoint(state)?;
        Ok(true)
    }

    /// Snapshot + маркер checkpoint + очистка старых файлов журнала
    pub fn checkpoint(&mut self, state: &AuthState) -> Result<(), AuthError> {
        let last_sequence = self.journal.current_sequence();
        self.save_snapshot(state, last_sequence)?;
        self.journal.checkpoint()?;
        self.journal.cleanup_old_logs(2)?;
        self.operations_since_snapshot = 0;
        info!(last_sequence, "checkpoint created");
        Ok(())
    }

    /// Человекочитаемая копия состояния в JSON
    pub fn dump_json(state: &AuthState, path: &Path) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(state)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Заимствующая версия `Snapshot` для записи без клонирования состояния
#[derive(Serialize)]
struct SnapshotRef<'a> {
    last_sequence: u64,
    state: &'a AuthState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActionSet, Grantee, ObjectType, PrivilegeObject, PrivilegeType};
    use tempfile::TempDir;

    fn grant_create_table(user: &str, db: u64) -> Operation {
        Operation::GrantPrivileges {
            grantee: Grantee::User(user.to_string()),
            object_type: ObjectType::Database,
            actions: ActionSet::CREATE_TABLE,
            objects: vec![Some(PrivilegeObject::database(db))],
            with_grant_option: false,
        }
    }

    fn run(storage: &mut StorageEngine, state: &mut AuthState, op: Operation) {
        state.apply(&op).unwrap();
        storage.log(op).unwrap();
    }

    #[test]
    fn test_storage_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let data_path = temp_dir.path().join("data");

        let _storage = StorageEngine::new(&data_path).unwrap();
        assert!(data_path.is_dir());
        assert!(data_path.join("journal").is_dir());
    }

    #[test]
    fn test_fresh_directory_gets_initial_state() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
        let state = storage.load_state("admin").unwrap();
        assert!(state.user("admin").unwrap().has_role("root"));
    }

    #[test]
    fn test_journal_crash_recovery() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
            let mut state = storage.load_state("root").unwrap();
            run(&mut storage, &mut state, Operation::CreateUser { name: "alice".to_string() });
            run(
                &mut storage,
                &mut state,
                Operation::CreateDatabase {
                    name: "db1".to_string(),
                    id: 10001,
                },
            );
            run(&mut storage, &mut state, grant_create_table("alice", 10001));
            // без checkpoint: состояние восстанавливается только из журнала
        }

        let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
        let state = storage.load_state("root").unwrap();
        assert!(state
            .check_privilege(
                "alice",
                ObjectType::Database,
                PrivilegeType::CreateTable,
                Some(&PrivilegeObject::database(10001)),
            )
            .unwrap());
    }

    #[test]
    fn test_checkpoint_does_not_replay_twice() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
            let mut state = storage.load_state("root").unwrap();
            run(&mut storage, &mut state, Operation::CreateUser { name: "alice".to_string() });
            storage.checkpoint(&state).unwrap();
            run(&mut storage, &mut state, Operation::CreateUser { name: "bob".to_string() });
        }

        // CreateUser alice уже в snapshot: повторное применение дало бы ошибку
        let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
        let state = storage.load_state("root").unwrap();
        assert!(state.user("alice").is_ok());
        assert!(state.user("bob").is_ok());
        assert_eq!(storage.operations_since_snapshot, 1);
    }

    #[test]
    fn test_sequence_survives_journal_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
            let mut state = storage.load_state("root").unwrap();
            run(&mut storage, &mut state, Operation::CreateUser { name: "alice".to_string() });
            storage.checkpoint(&state).unwrap();
            storage.checkpoint(&state).unwrap();
            storage.checkpoint(&state).unwrap();
        }

        let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
        let mut state = storage.load_state("root").unwrap();
        run(&mut storage, &mut state, Operation::CreateUser { name: "carol".to_string() });
        drop(storage);

        let mut storage = StorageEngine::new(temp_dir.path()).unwrap();
        let state = storage.load_state("root").unwrap();
        assert!(state.user("carol").is_ok());
    }

    #[test]
    fn test_maybe_checkpoint_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = StorageEngine::new(temp_dir.path())
            .unwrap()
            .with_snapshot_threshold(2);
        let mut state = storage.load_state("root").unwrap();

        run(&mut storage, &mut state, Operation::CreateUser { name: "a".to_string() });
        assert!(!storage.maybe_checkpoint(&state).unwrap());
        run(&mut storage, &mut state, Operation::CreateUser { name: "b".to_string() });
        assert!(storage.maybe_checkpoint(&state).unwrap());
        assert!(temp_dir.path().join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn test_dump_json() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = AuthState::initialize("root");
        state.create_user("alice").unwrap();

        let path = temp_dir.path().join("dump.json");
        StorageEngine::dump_json(&state, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(value["users"]["alice"].is_object());
        assert!(value["roles"]["root"]["is_builtin"].as_bool().unwrap());
    }
}
