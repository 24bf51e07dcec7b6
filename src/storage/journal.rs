use crate::core::{
    ActionSet, AuthError, AuthState, Grantee, NamedKind, ObjectType, PrivilegeObject, TableKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const JOURNAL_EXT: &str = "journal";

/// Изменения состояния авторизации, записываемые в журнал
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Operation {
    CreateCatalog {
        name: String,
        id: u64,
    },
    DropCatalog {
        name: String,
    },
    CreateDatabase {
        name: String,
        id: u64,
    },
    /// DROP DATABASE (вместе с таблицами и функциями)
    DropDatabase {
        name: String,
    },
    /// CREATE TABLE / VIEW / MATERIALIZED VIEW
    CreateTable {
        database: String,
        name: String,
        kind: TableKind,
        id: Uuid,
    },
    DropTable {
        database: String,
        name: String,
        kind: TableKind,
    },
    /// Функция базы данных или глобальная функция (`database == None`)
    CreateFunction {
        database: Option<String>,
        signature: String,
    },
    DropFunction {
        database: Option<String>,
        signature: String,
    },
    /// RESOURCE GROUP / RESOURCE / STORAGE VOLUME
    CreateNamed {
        kind: NamedKind,
        name: String,
    },
    DropNamed {
        kind: NamedKind,
        name: String,
    },
    CreateUser {
        name: String,
    },
    DropUser {
        name: String,
    },
    CreateRole {
        name: String,
    },
    DropRole {
        name: String,
    },
    GrantPrivileges {
        grantee: Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: Vec<Option<PrivilegeObject>>,
        with_grant_option: bool,
    },
    RevokePrivileges {
        grantee: Grantee,
        object_type: ObjectType,
        actions: ActionSet,
        objects: Vec<Option<PrivilegeObject>>,
    },
    GrantRole {
        role: String,
        grantee: Grantee,
    },
    RevokeRole {
        role: String,
        grantee: Grantee,
    },
    /// Сборка записей на удаленные объекты
    RemoveInvalidObjects,
    /// Checkpoint marker - указывает что был создан snapshot
    Checkpoint {
        timestamp: DateTime<Utc>,
    },
}

impl AuthState {
    /// Применяет операцию журнала к состоянию.
    ///
    /// Используется и при выполнении команд, и при восстановлении после перезапуска,
    /// поэтому результат зависит только от операции и текущего состояния.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), AuthError> {
        match operation {
            Operation::CreateCatalog { name, id } => self.catalog.create_catalog(name, *id),
            Operation::DropCatalog { name } => self.catalog.drop_catalog(name),
            Operation::CreateDatabase { name, id } => self.catalog.create_database(name, *id),
            Operation::DropDatabase { name } => self.catalog.drop_database(name).map(|_| ()),
            Operation::CreateTable {
                database,
                name,
                kind,
                id,
            } => self.catalog.create_table(database, name, *kind, *id),
            Operation::DropTable {
                database,
                name,
                kind,
            } => self.catalog.drop_table(database, name, *kind),
            Operation::CreateFunction {
                database: Some(database),
                signature,
            } => self.catalog.create_function(database, signature),
            Operation::CreateFunction {
                database: None,
                signature,
            } => self.catalog.create_global_function(signature),
            Operation::DropFunction {
                database: Some(database),
                signature,
            } => self.catalog.drop_function(database, signature),
            Operation::DropFunction {
                database: None,
                signature,
            } => self.catalog.drop_global_function(signature),
            Operation::CreateNamed { kind, name } => self.catalog.create_named(*kind, name),
            Operation::DropNamed { kind, name } => self.catalog.drop_named(*kind, name),
            Operation::CreateUser { name } => self.create_user(name),
            Operation::DropUser { name } => self.drop_user(name),
            Operation::CreateRole { name } => self.create_role(name),
            Operation::DropRole { name } => self.drop_role(name),
            Operation::GrantPrivileges {
                grantee,
                object_type,
                actions,
                objects,
                with_grant_option,
            } => self.grant_privileges(grantee, *object_type, *actions, objects, *with_grant_option),
            Operation::RevokePrivileges {
                grantee,
                object_type,
                actions,
                objects,
            } => self.revoke_privileges(grantee, *object_type, *actions, objects),
            Operation::GrantRole { role, grantee } => self.grant_role(role, grantee),
            Operation::RevokeRole { role, grantee } => self.revoke_role(role, grantee),
            Operation::RemoveInvalidObjects => {
                self.remove_invalid_objects();
                Ok(())
            }
            Operation::Checkpoint { .. } => Ok(()),
        }
    }
}

/// Запись в журнале
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Порядковый номер (LSN - Log Sequence Number)
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

impl LogEntry {
    #[must_use]
    pub fn new(sequence: u64, operation: Operation) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            operation,
        }
    }
}

/// Менеджер журнала операций
pub struct JournalManager {
    /// Директория для файлов журнала
    journal_dir: PathBuf,
    /// Текущий sequence number
    current_sequence: u64,
    /// Текущий активный файл
    current_file: Option<File>,
    /// Максимальный размер файла в байтах (по умолчанию 1MB)
    max_file_size: u64,
}

fn journal_files(dir: &Path) -> Result<Vec<PathBuf>, AuthError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some(JOURNAL_EXT) {
            files.push(path);
        }
    }
    // имя файла - время создания в hex, сортировка по имени хронологическая
    files.sort();
    Ok(files)
}

impl JournalManager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, AuthError> {
        let journal_dir = data_dir.as_ref().join("journal");
        fs::create_dir_all(&journal_dir)?;

        let mut manager = Self {
            journal_dir,
            current_sequence: 0,
            current_file: None,
            max_file_size: 1024 * 1024,
        };

        manager.recover_sequence()?;
        manager.rotate()?;

        Ok(manager)
    }

    #[must_use]
    pub const fn current_sequence(&self) -> u64 {
        self.current_sequence
    }

    /// Не дает номеру откатиться назад, если журнал был очищен после snapshot
    pub const fn ensure_sequence_at_least(&mut self, sequence: u64) {
        if sequence > self.current_sequence {
            self.current_sequence = sequence;
        }
    }

    fn recover_sequence(&mut self) -> Result<(), AuthError> {
        let mut max_sequence = 0u64;
        for path in journal_files(&self.journal_dir)? {
            for entry in Self::read_file(&path)? {
                max_sequence = max_sequence.max(entry.sequence);
            }
        }
        self.current_sequence = max_sequence;
        Ok(())
    }

    /// Открывает новый файл журнала (rotation)
    fn rotate(&mut self) -> Result<(), AuthError> {
        if let Some(mut file) = self.current_file.take() {
            file.flush()?;
        }

        let name = format!("{:016x}.{JOURNAL_EXT}", Utc::now().timestamp_micros());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal_dir.join(&name))?;
        debug!(file = %name, "opened journal file");

        self.current_file = Some(file);
        Ok(())
    }

    /// Записывает операцию в журнал и возвращает ее номер
    pub fn append(&mut self, operation: Operation) -> Result<u64, AuthError> {
        self.current_sequence += 1;
        let entry = LogEntry::new(self.current_sequence, operation);

        let encoded = bincode::serialize(&entry)
            .map_err(|e| AuthError::BinarySerialization(e.to_string()))?;
        let len = u32::try_from(encoded.len())
            .map_err(|_| AuthError::BinarySerialization("journal record too large".to_string()))?;

        if let Some(ref mut file) = self.current_file {
            // длина (4 байта) + данные
            file.write_all(&len.to_le_bytes())?;
            file.write_all(&encoded)?;
            file.flush()?;

            if file.metadata()?.len() >= self.max_file_size {
                self.rotate()?;
            }
        }

        Ok(self.current_sequence)
    }

    fn read_file(path: &Path) -> Result<Vec<LogEntry>, AuthError> {
        let mut file = File::open(path)?;
        let mut entries = Vec::new();

        loop {
            let mut len_bytes = [0u8; 4];
            match file.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            if let Err(e) = file.read_exact(&mut data) {
                // оборванная запись в конце файла (падение во время записи)
                warn!(path = %path.display(), error = %e, "truncated journal record");
                break;
            }

            match bincode::deserialize::<LogEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt journal record");
                }
            }
        }

        Ok(entries)
    }

    /// Все записи журнала по возрастанию номера
    pub fn read_all_logs(&self) -> Result<Vec<LogEntry>, AuthError> {
        let mut all_entries = Vec::new();
        for path in journal_files(&self.journal_dir)? {
            all_entries.extend(Self::read_file(&path)?);
        }
        all_entries.sort_by_key(|e| e.sequence);
        Ok(all_entries)
    }

    /// Удаляет старые файлы журнала, оставляя последние `keep_count`
    pub fn cleanup_old_logs(&self, keep_count: usize) -> Result<(), AuthError> {
        let files = journal_files(&self.journal_dir)?;
        if files.len() > keep_count {
            let to_remove = files.len() - keep_count;
            for path in files.iter().take(to_remove) {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove old journal file");
                }
            }
        }
        Ok(())
    }

    /// Записывает checkpoint маркер и начинает новый файл
    pub fn checkpoint(&mut self) -> Result<u64, AuthError> {
        let sequence = self.append(Operation::Checkpoint {
            timestamp: Utc::now(),
        })?;
        self.rotate()?;
        Ok(sequence)
    }
}
