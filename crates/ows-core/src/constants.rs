//! Constantes del core.
//!
//! Agrupa los literales que forman parte del contrato con el worker externo:
//! convención de nombres de artifacts, layout del workspace y argumentos
//! especiales. Cambiar cualquiera de ellos rompe la compatibilidad con jobs
//! ya persistidos en disco.

/// Versión lógica del core. Se incluye en el fingerprint de la especificación.
pub const CORE_VERSION: &str = "OWS1.0";

/// Marcador que distingue un artifact en progreso de uno completo.
pub const INCOMPLETE_FLAG: &str = "-INCOMPLETE";

/// Extensión de los artifacts (sin punto).
pub const ARTIFACT_EXTENSION: &str = "csv";

/// Separador de columnas de los artifacts CSV.
pub const CSV_SEPARATOR: char = ';';

/// Cabecera fija de todo artifact.
pub const ARTIFACT_HEADER: [&str; 3] = ["url", "content", "depth"];

/// Extensión de los archivos de especificación.
pub const SPEC_EXTENSION: &str = "json";

/// Carácter que sustituye al separador de paths en las claves de artifact.
pub const KEY_FILLER: char = '_';

// Layout del workspace
pub const JOBS_DIR: &str = "jobs";
pub const RAW_DIR: &str = "raw";
pub const LOGS_DIR: &str = "logs";
pub const RUNNING_DIR: &str = "running";
pub const COMPLETED_DIR: &str = "completed";

/// Argumento que pide al worker imprimir su info (JSON de una línea) y salir.
pub const WORKER_INFO_ARG: &str = "INFO";

/// Archivo (dentro de `logs/`) que recibe stdout y stderr del worker.
pub const WORKER_LOG_FILE: &str = "worker.log";

/// Datos laterales que el worker puede dejar en `logs/` para los finalizers.
pub const SIDE_DATA_FILE: &str = "side_data.json";

/// Pid del worker en curso (dentro de `logs/`); existe mientras corre.
pub const WORKER_PID_FILE: &str = "worker.pid";
