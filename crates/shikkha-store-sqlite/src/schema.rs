//! SQL schema for the Shikkha SQLite warehouse.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.
//!
//! Layer layout mirrors the pipeline: `raw_*` landing tables keep source
//! rows verbatim with an insertion sequence, `stg_*` views expose them to
//! the builders, `dim_*` tables hold immutable version rows whose validity
//! intervals are computed by the `dim_*_v` views, `fct_*` tables are
//! replaced a month at a time, and `mart_*` tables are fully rebuilt.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Raw landing tables ──────────────────────────────────────────────────
-- Append-only. source_seq orders arrivals and breaks update-instant ties.

CREATE TABLE IF NOT EXISTS raw_students (
    source_seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id           TEXT NOT NULL,
    full_name            TEXT NOT NULL,
    gender               TEXT,
    date_of_birth        TEXT,
    division             TEXT,
    district             TEXT,
    upazila              TEXT,
    socioeconomic_status TEXT,
    disability_status    TEXT,
    guardian_contact     TEXT,
    updated_at           TEXT NOT NULL,   -- ISO 8601 UTC; source-assigned
    loaded_at            TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS raw_teachers (
    source_seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    teacher_id        TEXT NOT NULL,
    full_name         TEXT NOT NULL,
    gender            TEXT,
    school_id         TEXT,
    subject_specialty TEXT,
    qualification     TEXT,
    hire_date         TEXT,
    updated_at        TEXT NOT NULL,
    loaded_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_schools (
    source_seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id       TEXT NOT NULL,
    school_name     TEXT NOT NULL,
    school_type     TEXT,
    education_level TEXT,
    division        TEXT,
    district        TEXT,
    upazila         TEXT,
    geo_location    TEXT,
    updated_at      TEXT NOT NULL,
    loaded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_enrollments (
    source_seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    enrollment_id   TEXT NOT NULL,
    student_id      TEXT NOT NULL,
    school_id       TEXT NOT NULL,
    academic_year   TEXT NOT NULL,
    grade_level     TEXT NOT NULL,
    section         TEXT,
    status          TEXT,
    enrollment_date TEXT NOT NULL,       -- ISO 8601 date; the business date
    dropout_reason  TEXT,
    updated_at      TEXT NOT NULL,
    loaded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_attendances (
    source_seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    attendance_id   TEXT NOT NULL,
    student_id      TEXT NOT NULL,
    school_id       TEXT NOT NULL,
    attendance_date TEXT NOT NULL,
    status          TEXT,
    period          INTEGER,
    remarks         TEXT,
    updated_at      TEXT NOT NULL,
    loaded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_assessments (
    source_seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id       TEXT NOT NULL,
    student_id      TEXT NOT NULL,
    school_id       TEXT NOT NULL,
    teacher_id      TEXT,
    subject         TEXT NOT NULL,
    assessment_type TEXT,
    grade_level     TEXT,
    academic_year   TEXT NOT NULL,
    term            TEXT,
    assessment_date TEXT NOT NULL,
    marks_obtained  REAL NOT NULL,
    max_marks       REAL NOT NULL,
    updated_at      TEXT NOT NULL,
    loaded_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS raw_students_updated_idx    ON raw_students(updated_at);
CREATE INDEX IF NOT EXISTS raw_teachers_updated_idx    ON raw_teachers(updated_at);
CREATE INDEX IF NOT EXISTS raw_schools_updated_idx     ON raw_schools(updated_at);
CREATE INDEX IF NOT EXISTS raw_enrollments_date_idx    ON raw_enrollments(enrollment_date);
CREATE INDEX IF NOT EXISTS raw_attendances_date_idx    ON raw_attendances(attendance_date);
CREATE INDEX IF NOT EXISTS raw_assessments_date_idx    ON raw_assessments(assessment_date);

-- ── Staging views ───────────────────────────────────────────────────────
-- The builders read staging, never the raw tables directly.

CREATE VIEW IF NOT EXISTS stg_students AS
SELECT source_seq, student_id, full_name, gender, date_of_birth,
       division, district, upazila, socioeconomic_status,
       disability_status, guardian_contact, updated_at
FROM raw_students;

CREATE VIEW IF NOT EXISTS stg_teachers AS
SELECT source_seq, teacher_id, full_name, gender, school_id,
       subject_specialty, qualification, hire_date, updated_at
FROM raw_teachers;

CREATE VIEW IF NOT EXISTS stg_schools AS
SELECT source_seq, school_id, school_name, school_type, education_level,
       division, district, upazila, geo_location, updated_at
FROM raw_schools;

CREATE VIEW IF NOT EXISTS stg_enrollments AS
SELECT source_seq, enrollment_id, student_id, school_id, academic_year,
       grade_level, section, status, enrollment_date, dropout_reason,
       updated_at
FROM raw_enrollments;

CREATE VIEW IF NOT EXISTS stg_attendances AS
SELECT source_seq, attendance_id, student_id, school_id, attendance_date,
       status, period, remarks, updated_at
FROM raw_attendances;

CREATE VIEW IF NOT EXISTS stg_assessments AS
SELECT source_seq, result_id, student_id, school_id, teacher_id, subject,
       assessment_type, grade_level, academic_year, term, assessment_date,
       marks_obtained, max_marks, updated_at
FROM raw_assessments;

-- ── Dimensions ──────────────────────────────────────────────────────────
-- Version rows are strictly append-only. No UPDATE or DELETE is ever
-- issued against these tables; validity intervals and the current flag
-- are computed by the views below from the version chain itself.

CREATE TABLE IF NOT EXISTS dim_students (
    surrogate_key      TEXT PRIMARY KEY,
    student_id         TEXT NOT NULL,
    full_name          TEXT NOT NULL,
    gender             TEXT NOT NULL,
    date_of_birth      TEXT,
    division           TEXT NOT NULL,
    district           TEXT NOT NULL,
    upazila            TEXT NOT NULL,
    socioeconomic_tier TEXT NOT NULL,
    has_disability     INTEGER,          -- NULL = source did not say
    guardian_contact   TEXT,
    age_group          TEXT,
    attr_hash          TEXT NOT NULL,
    effective_from     TEXT NOT NULL,
    UNIQUE (student_id, effective_from)
);

CREATE TABLE IF NOT EXISTS dim_teachers (
    surrogate_key     TEXT PRIMARY KEY,
    teacher_id        TEXT NOT NULL,
    full_name         TEXT NOT NULL,
    gender            TEXT NOT NULL,
    school_id         TEXT,
    subject_specialty TEXT,
    qualification     TEXT,
    hire_date         TEXT,
    attr_hash         TEXT NOT NULL,
    effective_from    TEXT NOT NULL,
    UNIQUE (teacher_id, effective_from)
);

CREATE TABLE IF NOT EXISTS dim_schools (
    surrogate_key   TEXT PRIMARY KEY,
    school_id       TEXT NOT NULL,
    school_name     TEXT NOT NULL,
    school_type     TEXT NOT NULL,
    education_level TEXT NOT NULL,
    division        TEXT NOT NULL,
    district        TEXT NOT NULL,
    upazila         TEXT NOT NULL,
    is_rural        INTEGER NOT NULL,
    geo_location    TEXT,
    attr_hash       TEXT NOT NULL,
    effective_from  TEXT NOT NULL,
    UNIQUE (school_id, effective_from)
);

-- Validity intervals are half-open: [effective_from, effective_to). The
-- latest version of a chain is open-ended at the far-future sentinel.

CREATE VIEW IF NOT EXISTS dim_students_v AS
SELECT d.*,
       COALESCE(LEAD(effective_from) OVER w,
                '9999-12-31T00:00:00.000000Z') AS effective_to,
       (LEAD(effective_from) OVER w IS NULL)   AS is_current
FROM dim_students d
WINDOW w AS (PARTITION BY student_id ORDER BY effective_from);

CREATE VIEW IF NOT EXISTS dim_teachers_v AS
SELECT d.*,
       COALESCE(LEAD(effective_from) OVER w,
                '9999-12-31T00:00:00.000000Z') AS effective_to,
       (LEAD(effective_from) OVER w IS NULL)   AS is_current
FROM dim_teachers d
WINDOW w AS (PARTITION BY teacher_id ORDER BY effective_from);

CREATE VIEW IF NOT EXISTS dim_schools_v AS
SELECT d.*,
       COALESCE(LEAD(effective_from) OVER w,
                '9999-12-31T00:00:00.000000Z') AS effective_to,
       (LEAD(effective_from) OVER w IS NULL)   AS is_current
FROM dim_schools d
WINDOW w AS (PARTITION BY school_id ORDER BY effective_from);

CREATE TABLE IF NOT EXISTS dim_geography (
    surrogate_key TEXT PRIMARY KEY,
    division      TEXT NOT NULL,
    district      TEXT NOT NULL,
    upazila       TEXT NOT NULL,
    is_urban      INTEGER NOT NULL,
    UNIQUE (division, district, upazila)
);

CREATE TABLE IF NOT EXISTS dim_time (
    date_key      TEXT PRIMARY KEY,     -- ISO 8601 date
    year          INTEGER NOT NULL,
    month         INTEGER NOT NULL,
    day           INTEGER NOT NULL,
    day_of_week   TEXT NOT NULL,
    academic_year TEXT NOT NULL,
    term          TEXT NOT NULL,
    is_weekend    INTEGER NOT NULL
);

-- ── Facts ───────────────────────────────────────────────────────────────
-- partition_key is the YYYY-MM of the business date. A load replaces
-- whole partitions; rows are never updated in place.

CREATE TABLE IF NOT EXISTS fct_enrollments (
    surrogate_key  TEXT PRIMARY KEY,
    enrollment_id  TEXT NOT NULL,
    partition_key  TEXT NOT NULL,
    date_key       TEXT NOT NULL,
    student_sk     TEXT NOT NULL REFERENCES dim_students(surrogate_key),
    school_sk      TEXT NOT NULL REFERENCES dim_schools(surrogate_key),
    geography_sk   TEXT NOT NULL REFERENCES dim_geography(surrogate_key),
    academic_year  TEXT NOT NULL,
    grade_level    TEXT NOT NULL,
    section        TEXT,
    status         TEXT NOT NULL,
    is_active      INTEGER NOT NULL,
    is_dropout     INTEGER NOT NULL,
    dropout_reason TEXT,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fct_attendances (
    surrogate_key      TEXT PRIMARY KEY,
    attendance_id      TEXT NOT NULL,
    partition_key      TEXT NOT NULL,
    date_key           TEXT NOT NULL,
    student_sk         TEXT NOT NULL REFERENCES dim_students(surrogate_key),
    school_sk          TEXT NOT NULL REFERENCES dim_schools(surrogate_key),
    geography_sk       TEXT NOT NULL REFERENCES dim_geography(surrogate_key),
    academic_year      TEXT NOT NULL,
    status             TEXT NOT NULL,
    is_present         INTEGER NOT NULL,
    counts_toward_rate INTEGER NOT NULL,
    period             INTEGER,
    updated_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fct_assessment_results (
    surrogate_key    TEXT PRIMARY KEY,
    result_id        TEXT NOT NULL,
    partition_key    TEXT NOT NULL,
    date_key         TEXT NOT NULL,
    student_sk       TEXT NOT NULL REFERENCES dim_students(surrogate_key),
    school_sk        TEXT NOT NULL REFERENCES dim_schools(surrogate_key),
    teacher_sk       TEXT REFERENCES dim_teachers(surrogate_key),
    geography_sk     TEXT NOT NULL REFERENCES dim_geography(surrogate_key),
    academic_year    TEXT NOT NULL,
    term             TEXT,
    subject          TEXT NOT NULL,
    assessment_type  TEXT,
    grade_level      TEXT,
    marks_obtained   REAL NOT NULL,
    max_marks        REAL NOT NULL,
    percentage       REAL NOT NULL,
    normalized_score REAL NOT NULL,
    grade_letter     TEXT NOT NULL,
    is_pass          INTEGER NOT NULL,
    performance_band TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS fct_enrollments_partition_idx
    ON fct_enrollments(partition_key);
CREATE INDEX IF NOT EXISTS fct_enrollments_school_idx
    ON fct_enrollments(school_sk, academic_year);
CREATE INDEX IF NOT EXISTS fct_attendances_partition_idx
    ON fct_attendances(partition_key);
CREATE INDEX IF NOT EXISTS fct_attendances_student_idx
    ON fct_attendances(student_sk, date_key);
CREATE INDEX IF NOT EXISTS fct_assessment_results_partition_idx
    ON fct_assessment_results(partition_key);
CREATE INDEX IF NOT EXISTS fct_assessment_results_school_idx
    ON fct_assessment_results(school_sk, academic_year, term);
CREATE INDEX IF NOT EXISTS fct_assessment_results_student_idx
    ON fct_assessment_results(student_sk, academic_year);

-- ── Marts ───────────────────────────────────────────────────────────────
-- Rebuilt wholesale by every mart run.

CREATE TABLE IF NOT EXISTS mart_student_performance (
    student_id       TEXT NOT NULL,
    school_id        TEXT NOT NULL,
    academic_year    TEXT NOT NULL,
    student_name     TEXT NOT NULL,
    school_name      TEXT NOT NULL,
    division         TEXT NOT NULL,
    district         TEXT NOT NULL,
    assessment_count INTEGER NOT NULL,
    avg_percentage   REAL,
    pass_rate        REAL,
    performance_band TEXT,
    grade_a_plus     INTEGER NOT NULL,
    grade_a          INTEGER NOT NULL,
    grade_a_minus    INTEGER NOT NULL,
    grade_b          INTEGER NOT NULL,
    grade_c          INTEGER NOT NULL,
    grade_d          INTEGER NOT NULL,
    grade_f          INTEGER NOT NULL,
    school_days      INTEGER NOT NULL,
    present_days     INTEGER NOT NULL,
    absent_days      INTEGER NOT NULL,
    attendance_rate  REAL,
    PRIMARY KEY (student_id, school_id, academic_year)
);

CREATE TABLE IF NOT EXISTS mart_equity_metrics (
    division                 TEXT NOT NULL,
    district                 TEXT NOT NULL,
    school_type              TEXT NOT NULL,
    academic_year            TEXT NOT NULL,
    grade_level              TEXT NOT NULL,
    result_count             INTEGER NOT NULL,
    student_count            INTEGER NOT NULL,
    avg_score                REAL NOT NULL,
    pass_rate                REAL NOT NULL,
    gender_male_count        INTEGER NOT NULL,
    gender_female_count      INTEGER NOT NULL,
    gender_male_avg          REAL,
    gender_female_avg        REAL,
    gender_gap               REAL,
    gender_equitable         INTEGER,
    ses_nonlow_count         INTEGER NOT NULL,
    ses_low_count            INTEGER NOT NULL,
    ses_nonlow_avg           REAL,
    ses_low_avg              REAL,
    ses_gap                  REAL,
    ses_equitable            INTEGER,
    disability_without_count INTEGER NOT NULL,
    disability_with_count    INTEGER NOT NULL,
    disability_without_avg   REAL,
    disability_with_avg      REAL,
    disability_gap           REAL,
    disability_equitable     INTEGER,
    location_urban_count     INTEGER NOT NULL,
    location_rural_count     INTEGER NOT NULL,
    location_urban_avg       REAL,
    location_rural_avg       REAL,
    location_gap             REAL,
    location_equitable       INTEGER,
    PRIMARY KEY (division, district, school_type, academic_year, grade_level)
);

-- ── Run log ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS run_log (
    run_id           TEXT PRIMARY KEY,
    stage            TEXT NOT NULL,     -- 'dimensions' | 'facts' | 'marts'
    window_from      TEXT,              -- YYYY-MM; fact runs only
    window_to        TEXT,
    started_at       TEXT NOT NULL,
    finished_at      TEXT,
    status           TEXT NOT NULL,     -- 'running' | 'succeeded' | 'failed'
    source_watermark TEXT,
    report_json      TEXT
);

CREATE INDEX IF NOT EXISTS run_log_stage_idx ON run_log(stage, started_at);

PRAGMA user_version = 1;
";
