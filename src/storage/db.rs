use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;

/// Структура, представляющая пользователя в базе данных.
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram ID пользователя
    pub user_id: i64,
    /// Имя пользователя (username) в Telegram, если доступно
    pub username: Option<String>,
    /// Имя пользователя
    pub first_name: Option<String>,
    /// Фамилия пользователя
    pub last_name: Option<String>,
    /// Флаг администратора (0 - нет, 1 - да)
    pub is_admin: bool,
    /// Счётчик байт, скачанных в день `last_download_reset`.
    /// Значение валидно только относительно этой даты: если дата в прошлом,
    /// эффективное использование равно нулю (ленивый сброс).
    pub daily_download_bytes: i64,
    /// Календарная дата (UTC) последнего сброса счётчика
    pub last_download_reset: String,
}

/// Запись о VIP-подписке. Записи никогда не изменяются и не удаляются;
/// продление добавляет новую запись поверх конца действующей.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Идентификатор записи
    pub id: i64,
    /// Telegram ID пользователя
    pub user_id: i64,
    /// Тип подписки: "one_month" или "three_month"
    pub subscription_type: String,
    /// Сумма оплаты в томанах
    pub payment_amount: i64,
    /// Начало действия (UTC, "YYYY-MM-DD HH:MM:SS")
    pub start_date: String,
    /// Конец действия (UTC, "YYYY-MM-DD HH:MM:SS")
    pub end_date: String,
}

/// Плейлист пользователя.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Трек, скачанный хотя бы одним пользователем.
#[derive(Debug, Clone)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub platform: Option<String>,
    pub url: Option<String>,
    pub file_path: Option<String>,
    /// Длительность в секундах
    pub duration: Option<i64>,
    pub download_count: i64,
}

/// Запись журнала загрузок (append-only).
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub id: i64,
    pub user_id: i64,
    pub content_type: String,
    pub content_url: Option<String>,
    pub file_size: i64,
    pub download_date: String,
}

/// Обязательный для подписки канал.
#[derive(Debug, Clone)]
pub struct RequiredChannel {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_url: String,
    pub added_by: i64,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Returns
///
/// Returns a `DbPool` on success or an `r2d2::Error` if pool creation fails.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    // busy_timeout makes concurrent same-user quota upserts queue inside
    // SQLite instead of surfacing spurious SQLITE_BUSY to the handlers
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    // Ensure schema exists on first connection
    let conn = pool.get()?;
    if let Err(e) = create_tables(&conn) {
        log::warn!("Failed to create tables: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Создаёт все таблицы и индексы, если их ещё нет.
///
/// Вызывается при создании пула и из CLI-команды `init-db`; идемпотентна.
pub fn create_tables(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            daily_download_bytes INTEGER NOT NULL DEFAULT 0,
            last_download_reset DATE NOT NULL DEFAULT (date('now')),
            created_at DATETIME NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS vip_subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            subscription_type TEXT NOT NULL,
            payment_amount INTEGER NOT NULL DEFAULT 0,
            start_date DATETIME NOT NULL DEFAULT (datetime('now')),
            end_date DATETIME NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_vip_user_end
            ON vip_subscriptions(user_id, end_date);

        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT,
            platform TEXT,
            url TEXT UNIQUE,
            file_path TEXT,
            duration INTEGER,
            download_count INTEGER NOT NULL DEFAULT 0,
            added_at DATETIME NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            created_at DATETIME NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_playlists_user ON playlists(user_id);

        CREATE TABLE IF NOT EXISTS playlist_songs (
            playlist_id INTEGER NOT NULL,
            song_id INTEGER NOT NULL,
            added_at DATETIME NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (playlist_id, song_id)
        );

        CREATE TABLE IF NOT EXISTS download_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            content_url TEXT,
            file_size INTEGER NOT NULL DEFAULT 0,
            download_date DATETIME NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_history_user_date
            ON download_history(user_id, download_date);

        CREATE TABLE IF NOT EXISTS required_channels (
            channel_id TEXT PRIMARY KEY,
            channel_name TEXT NOT NULL,
            channel_url TEXT NOT NULL,
            added_by INTEGER NOT NULL,
            added_at DATETIME NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────
// Users
// ────────────────────────────────────────────────────────────────────

/// Создаёт пользователя или обновляет его имена, если он уже существует.
///
/// Квотные поля при конфликте не трогаются: имена приходят с каждым
/// апдейтом Telegram, а счётчик принадлежит квотному пути записи.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `user_id` - Telegram ID пользователя
/// * `username` - Имя пользователя (опционально)
/// * `first_name` - Имя (опционально)
/// * `last_name` - Фамилия (опционально)
pub fn upsert_user(
    conn: &DbConnection,
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, username, first_name, last_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             username = excluded.username,
             first_name = excluded.first_name,
             last_name = excluded.last_name",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &username as &dyn rusqlite::ToSql,
            &first_name as &dyn rusqlite::ToSql,
            &last_name as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Получает пользователя из базы данных по Telegram ID.
///
/// # Returns
///
/// Возвращает `Ok(Some(User))` если пользователь найден, `Ok(None)` если не найден,
/// или ошибку базы данных.
pub fn get_user(conn: &DbConnection, user_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, username, first_name, last_name, is_admin,
                daily_download_bytes, last_download_reset
         FROM users WHERE user_id = ?",
    )?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(User {
            user_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            is_admin: row.get::<_, i64>(4)? != 0,
            daily_download_bytes: row.get(5)?,
            last_download_reset: row.get(6)?,
        }))
    } else {
        Ok(None)
    }
}

/// Проверяет, является ли пользователь администратором (по флагу в БД).
pub fn is_admin(conn: &DbConnection, user_id: i64) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT is_admin FROM users WHERE user_id = ?")?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(row.get::<_, i64>(0)? != 0)
    } else {
        Ok(false)
    }
}

/// Возвращает общее количество пользователей.
pub fn count_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

// ────────────────────────────────────────────────────────────────────
// Daily download quota
// ────────────────────────────────────────────────────────────────────

/// Возвращает количество байт, скачанных пользователем сегодня.
///
/// Если записи нет — 0. Если `last_download_reset` раньше сегодняшней даты,
/// тоже 0: сброс ленивый, чтение никогда не пишет в базу.
pub fn get_download_usage(conn: &DbConnection, user_id: i64) -> Result<u64> {
    let mut stmt = conn.prepare(
        "SELECT CASE
             WHEN last_download_reset < date('now') THEN 0
             ELSE daily_download_bytes
         END
         FROM users WHERE user_id = ?",
    )?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        let bytes: i64 = row.get(0)?;
        Ok(bytes.max(0) as u64)
    } else {
        Ok(0)
    }
}

/// Атомарно учитывает завершённую загрузку в дневном счётчике.
///
/// Один UPSERT: если сохранённая дата сброса раньше сегодняшней, счётчик
/// начинается заново с `byte_size`, иначе инкрементируется на месте; дата
/// сброса в обоих случаях становится сегодняшней. Выполняется как единый
/// SQL-оператор — никакого чтения-потом-записи на стороне приложения,
/// иначе две одновременно завершившиеся загрузки теряют инкремент.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `user_id` - Telegram ID пользователя
/// * `byte_size` - Размер загрузки в байтах (0 допустим и учитывается как no-op)
///
/// # Returns
///
/// Возвращает новое суммарное использование за сегодня.
pub fn record_download_usage(conn: &DbConnection, user_id: i64, byte_size: u64) -> Result<u64> {
    let added = byte_size as i64;
    let updated: i64 = conn.query_row(
        "INSERT INTO users (user_id, daily_download_bytes, last_download_reset)
         VALUES (?1, ?2, date('now'))
         ON CONFLICT(user_id) DO UPDATE SET
             daily_download_bytes = CASE
                 WHEN users.last_download_reset < date('now') THEN excluded.daily_download_bytes
                 ELSE users.daily_download_bytes + excluded.daily_download_bytes
             END,
             last_download_reset = date('now')
         RETURNING daily_download_bytes",
        &[&user_id as &dyn rusqlite::ToSql, &added as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(updated.max(0) as u64)
}

// ────────────────────────────────────────────────────────────────────
// VIP subscriptions
// ────────────────────────────────────────────────────────────────────

fn subscription_from_row(row: &rusqlite::Row<'_>) -> Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subscription_type: row.get(2)?,
        payment_amount: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
    })
}

/// Возвращает действующую подписку пользователя, если она есть.
///
/// Среди записей с `end_date` строго в будущем выбирается самая поздняя;
/// при равных `end_date` побеждает больший id — детерминированно, хотя при
/// корректной семантике продления такого не бывает.
pub fn get_active_subscription(conn: &DbConnection, user_id: i64) -> Result<Option<Subscription>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, subscription_type, payment_amount, start_date, end_date
         FROM vip_subscriptions
         WHERE user_id = ?1 AND end_date > datetime('now')
         ORDER BY end_date DESC, id DESC
         LIMIT 1",
    )?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(subscription_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Проверяет наличие действующей подписки без материализации записи.
///
/// Горячий путь каждой проверки допуска, поэтому только EXISTS.
pub fn has_active_subscription(conn: &DbConnection, user_id: i64) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM vip_subscriptions
             WHERE user_id = ?1 AND end_date > datetime('now'))",
        &[&user_id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

/// Вставляет новую запись подписки, наслаивая её на конец действующей.
///
/// Начало новой записи — более позднее из {сейчас, конец действующей
/// подписки}, поэтому покупка при активной подписке продлевает окно, а не
/// сжигает оставшиеся дни. Старые записи не изменяются и не удаляются.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `user_id` - Telegram ID пользователя
/// * `subscription_type` - Тип подписки ("one_month", "three_month")
/// * `payment_amount` - Сумма оплаты в томанах
/// * `duration_days` - Длительность в днях
///
/// # Returns
///
/// Возвращает созданную запись `Subscription`.
pub fn insert_subscription(
    conn: &DbConnection,
    user_id: i64,
    subscription_type: &str,
    payment_amount: i64,
    duration_days: i64,
) -> Result<Subscription> {
    conn.query_row(
        "INSERT INTO vip_subscriptions
             (user_id, subscription_type, payment_amount, start_date, end_date)
         SELECT ?1, ?2, ?3, base.start_at, datetime(base.start_at, '+' || ?4 || ' days')
         FROM (SELECT COALESCE(
                   (SELECT MAX(end_date) FROM vip_subscriptions
                    WHERE user_id = ?1 AND end_date > datetime('now')),
                   datetime('now')) AS start_at) AS base
         RETURNING id, user_id, subscription_type, payment_amount, start_date, end_date",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &subscription_type as &dyn rusqlite::ToSql,
            &payment_amount as &dyn rusqlite::ToSql,
            &duration_days as &dyn rusqlite::ToSql,
        ],
        |row| subscription_from_row(row),
    )
}

/// Возвращает все действующие подписки (для админ-панели).
pub fn get_all_active_subscriptions(conn: &DbConnection) -> Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, subscription_type, payment_amount, start_date, end_date
         FROM vip_subscriptions
         WHERE end_date > datetime('now')
         ORDER BY end_date DESC",
    )?;
    let rows = stmt.query_map([], |row| subscription_from_row(row))?;
    rows.collect()
}

/// Количество пользователей с действующей подпиской.
pub fn count_vip_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM vip_subscriptions WHERE end_date > datetime('now')",
        [],
        |row| row.get(0),
    )
}

/// Общее количество записей о подписках за всё время.
pub fn count_total_subscriptions(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM vip_subscriptions", [], |row| row.get(0))
}

/// Количество подписок указанного типа за всё время.
pub fn count_subscriptions_by_type(conn: &DbConnection, subscription_type: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM vip_subscriptions WHERE subscription_type = ?1",
        &[&subscription_type as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )
}

/// Суммарная выручка по всем подпискам, в томанах.
pub fn total_revenue(conn: &DbConnection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(payment_amount), 0) FROM vip_subscriptions",
        [],
        |row| row.get(0),
    )
}

// ────────────────────────────────────────────────────────────────────
// Download history (append-only audit log)
// ────────────────────────────────────────────────────────────────────

/// Добавляет запись в журнал загрузок.
///
/// Журнал только дописывается; логика допуска его не читает.
pub fn add_download(
    conn: &DbConnection,
    user_id: i64,
    content_type: &str,
    content_url: Option<&str>,
    file_size: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO download_history (user_id, content_type, content_url, file_size)
         VALUES (?1, ?2, ?3, ?4)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &content_type as &dyn rusqlite::ToSql,
            &content_url as &dyn rusqlite::ToSql,
            &file_size as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Последние загрузки пользователя, новые первыми.
pub fn get_user_downloads(conn: &DbConnection, user_id: i64, limit: i64) -> Result<Vec<DownloadRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content_type, content_url, file_size, download_date
         FROM download_history
         WHERE user_id = ?1
         ORDER BY download_date DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(
        &[&user_id as &dyn rusqlite::ToSql, &limit as &dyn rusqlite::ToSql],
        |row| {
            Ok(DownloadRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content_type: row.get(2)?,
                content_url: row.get(3)?,
                file_size: row.get(4)?,
                download_date: row.get(5)?,
            })
        },
    )?;
    rows.collect()
}

/// Количество загрузок за сегодняшний день по всему боту.
pub fn count_downloads_today(conn: &DbConnection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM download_history WHERE date(download_date) = date('now')",
        [],
        |row| row.get(0),
    )
}

// ────────────────────────────────────────────────────────────────────
// Songs
// ────────────────────────────────────────────────────────────────────

fn song_from_row(row: &rusqlite::Row<'_>) -> Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        platform: row.get(3)?,
        url: row.get(4)?,
        file_path: row.get(5)?,
        duration: row.get(6)?,
        download_count: row.get(7)?,
    })
}

const SONG_COLUMNS: &str = "id, title, artist, platform, url, file_path, duration, download_count";

/// Создаёт запись трека. URL уникален: повторная загрузка того же трека
/// должна переиспользовать существующую запись (`get_song_by_url`).
pub fn create_song(
    conn: &DbConnection,
    title: &str,
    artist: Option<&str>,
    platform: Option<&str>,
    url: Option<&str>,
    file_path: Option<&str>,
    duration: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO songs (title, artist, platform, url, file_path, duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            &title as &dyn rusqlite::ToSql,
            &artist as &dyn rusqlite::ToSql,
            &platform as &dyn rusqlite::ToSql,
            &url as &dyn rusqlite::ToSql,
            &file_path as &dyn rusqlite::ToSql,
            &duration as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Получает трек по идентификатору.
pub fn get_song(conn: &DbConnection, song_id: i64) -> Result<Option<Song>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM songs WHERE id = ?", SONG_COLUMNS))?;
    let mut rows = stmt.query(&[&song_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(song_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Получает трек по URL источника.
pub fn get_song_by_url(conn: &DbConnection, url: &str) -> Result<Option<Song>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM songs WHERE url = ?", SONG_COLUMNS))?;
    let mut rows = stmt.query(&[&url as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(song_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Инкрементирует счётчик загрузок трека.
pub fn increment_download_count(conn: &DbConnection, song_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE songs SET download_count = download_count + 1 WHERE id = ?1",
        &[&song_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Популярные треки по числу загрузок.
pub fn get_popular_songs(conn: &DbConnection, limit: i64) -> Result<Vec<Song>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM songs ORDER BY download_count DESC LIMIT ?",
        SONG_COLUMNS
    ))?;
    let rows = stmt.query_map(&[&limit as &dyn rusqlite::ToSql], |row| song_from_row(row))?;
    rows.collect()
}

/// Недавно добавленные треки.
pub fn get_new_songs(conn: &DbConnection, limit: i64) -> Result<Vec<Song>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM songs ORDER BY added_at DESC, id DESC LIMIT ?",
        SONG_COLUMNS
    ))?;
    let rows = stmt.query_map(&[&limit as &dyn rusqlite::ToSql], |row| song_from_row(row))?;
    rows.collect()
}

// ────────────────────────────────────────────────────────────────────
// Playlists
// ────────────────────────────────────────────────────────────────────

fn playlist_from_row(row: &rusqlite::Row<'_>) -> Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Создаёт плейлист и возвращает его идентификатор.
pub fn create_playlist(conn: &DbConnection, user_id: i64, name: &str, description: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO playlists (user_id, name, description) VALUES (?1, ?2, ?3)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &name as &dyn rusqlite::ToSql,
            &description as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Получает плейлист по идентификатору.
pub fn get_playlist(conn: &DbConnection, playlist_id: i64) -> Result<Option<Playlist>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description, created_at FROM playlists WHERE id = ?",
    )?;
    let mut rows = stmt.query(&[&playlist_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(playlist_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Все плейлисты пользователя, новые первыми.
pub fn get_user_playlists(conn: &DbConnection, user_id: i64) -> Result<Vec<Playlist>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description, created_at
         FROM playlists WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(&[&user_id as &dyn rusqlite::ToSql], |row| playlist_from_row(row))?;
    rows.collect()
}

/// Переименовывает плейлист.
pub fn rename_playlist(conn: &DbConnection, playlist_id: i64, name: &str) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET name = ?1 WHERE id = ?2",
        &[&name as &dyn rusqlite::ToSql, &playlist_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Удаляет плейлист вместе со связями на треки.
pub fn delete_playlist(conn: &DbConnection, playlist_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM playlist_songs WHERE playlist_id = ?1",
        &[&playlist_id as &dyn rusqlite::ToSql],
    )?;
    conn.execute(
        "DELETE FROM playlists WHERE id = ?1",
        &[&playlist_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Добавляет трек в плейлист; повторное добавление обновляет дату.
pub fn add_song_to_playlist(conn: &DbConnection, playlist_id: i64, song_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO playlist_songs (playlist_id, song_id)
         VALUES (?1, ?2)
         ON CONFLICT(playlist_id, song_id) DO UPDATE SET added_at = datetime('now')",
        &[
            &playlist_id as &dyn rusqlite::ToSql,
            &song_id as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Убирает трек из плейлиста.
pub fn remove_song_from_playlist(conn: &DbConnection, playlist_id: i64, song_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
        &[
            &playlist_id as &dyn rusqlite::ToSql,
            &song_id as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Треки плейлиста, последние добавленные первыми.
pub fn get_playlist_songs(conn: &DbConnection, playlist_id: i64) -> Result<Vec<Song>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.title, s.artist, s.platform, s.url, s.file_path, s.duration, s.download_count
         FROM songs s
         JOIN playlist_songs ps ON s.id = ps.song_id
         WHERE ps.playlist_id = ?1
         ORDER BY ps.added_at DESC, s.id DESC",
    )?;
    let rows = stmt.query_map(&[&playlist_id as &dyn rusqlite::ToSql], |row| song_from_row(row))?;
    rows.collect()
}

// ────────────────────────────────────────────────────────────────────
// Required channels
// ────────────────────────────────────────────────────────────────────

/// Регистрирует обязательный канал.
pub fn add_required_channel(
    conn: &DbConnection,
    channel_id: &str,
    channel_name: &str,
    channel_url: &str,
    added_by: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO required_channels (channel_id, channel_name, channel_url, added_by)
         VALUES (?1, ?2, ?3, ?4)",
        &[
            &channel_id as &dyn rusqlite::ToSql,
            &channel_name as &dyn rusqlite::ToSql,
            &channel_url as &dyn rusqlite::ToSql,
            &added_by as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Список всех обязательных каналов.
pub fn get_required_channels(conn: &DbConnection) -> Result<Vec<RequiredChannel>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id, channel_name, channel_url, added_by FROM required_channels",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RequiredChannel {
            channel_id: row.get(0)?,
            channel_name: row.get(1)?,
            channel_url: row.get(2)?,
            added_by: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Удаляет обязательный канал.
pub fn delete_required_channel(conn: &DbConnection, channel_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM required_channels WHERE channel_id = ?1",
        &[&channel_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Количество обязательных каналов.
pub fn count_required_channels(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM required_channels", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_upsert_user_refreshes_names_only() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        upsert_user(&conn, 1, Some("ali"), Some("Ali"), None).unwrap();
        record_download_usage(&conn, 1, 100).unwrap();

        upsert_user(&conn, 1, Some("ali_new"), Some("Ali"), Some("Rezaei")).unwrap();
        let user = get_user(&conn, 1).unwrap().unwrap();

        assert_eq!(user.username.as_deref(), Some("ali_new"));
        assert_eq!(user.last_name.as_deref(), Some("Rezaei"));
        // Quota counter survives the profile refresh
        assert_eq!(user.daily_download_bytes, 100);
    }

    #[test]
    fn test_usage_unknown_user_is_zero() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert_eq!(get_download_usage(&conn, 999).unwrap(), 0);
    }

    #[test]
    fn test_record_download_accumulates_same_day() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert_eq!(record_download_usage(&conn, 7, 100).unwrap(), 100);
        assert_eq!(record_download_usage(&conn, 7, 250).unwrap(), 350);
        assert_eq!(record_download_usage(&conn, 7, 0).unwrap(), 350);
        assert_eq!(get_download_usage(&conn, 7).unwrap(), 350);
    }

    #[test]
    fn test_record_download_creates_row_implicitly() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert!(get_user(&conn, 42).unwrap().is_none());
        record_download_usage(&conn, 42, 1).unwrap();
        assert!(get_user(&conn, 42).unwrap().is_some());
    }

    #[test]
    fn test_stale_counter_reads_zero_and_restarts_on_write() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        record_download_usage(&conn, 5, 500).unwrap();
        // Simulate a day rollover by aging the stored reset date
        conn.execute(
            "UPDATE users SET last_download_reset = date('now', '-1 day') WHERE user_id = 5",
            [],
        )
        .unwrap();

        // Lazy reset: read sees zero without mutating storage
        assert_eq!(get_download_usage(&conn, 5).unwrap(), 0);
        let stored: i64 = conn
            .query_row("SELECT daily_download_bytes FROM users WHERE user_id = 5", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(stored, 500);

        // Next write starts from the new day's size, not 500 + 80
        assert_eq!(record_download_usage(&conn, 5, 80).unwrap(), 80);
        assert_eq!(get_download_usage(&conn, 5).unwrap(), 80);
    }

    #[test]
    fn test_subscription_layering_extends_from_active_end() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        // Active subscription ending in 10 days
        conn.execute(
            "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
             VALUES (3, 'one_month', 50000, datetime('now', '+10 days'))",
            [],
        )
        .unwrap();

        let sub = insert_subscription(&conn, 3, "one_month", 50_000, 30).unwrap();

        // New record starts where the old one ends and runs 30 more days
        let (starts_at_old_end, ends_40_days_out): (bool, bool) = conn
            .query_row(
                "SELECT ?1 = (SELECT MAX(end_date) FROM vip_subscriptions WHERE id != ?3),
                        ?2 BETWEEN datetime('now', '+39 days') AND datetime('now', '+41 days')",
                &[
                    &sub.start_date as &dyn rusqlite::ToSql,
                    &sub.end_date as &dyn rusqlite::ToSql,
                    &sub.id as &dyn rusqlite::ToSql,
                ],
                |row| Ok((row.get::<_, i64>(0)? != 0, row.get::<_, i64>(1)? != 0)),
            )
            .unwrap();
        assert!(starts_at_old_end);
        assert!(ends_40_days_out);

        // The layered record is now the active one
        let active = get_active_subscription(&conn, 3).unwrap().unwrap();
        assert_eq!(active.id, sub.id);
    }

    #[test]
    fn test_subscription_without_active_starts_now() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        // A lapsed subscription must not influence the new start
        conn.execute(
            "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
             VALUES (4, 'one_month', 50000, datetime('now', '-5 days'))",
            [],
        )
        .unwrap();

        let sub = insert_subscription(&conn, 4, "three_month", 140_000, 90).unwrap();
        let in_range: i64 = conn
            .query_row(
                "SELECT ?1 BETWEEN datetime('now', '-1 minute') AND datetime('now', '+1 minute')",
                &[&sub.start_date as &dyn rusqlite::ToSql],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(in_range, 1);
    }

    #[test]
    fn test_active_subscription_tie_breaks_by_id() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        conn.execute(
            "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
             VALUES (6, 'one_month', 50000, datetime('now', '+30 days')),
                    (6, 'one_month', 50000, datetime('now', '+30 days'))",
            [],
        )
        .unwrap();

        let active = get_active_subscription(&conn, 6).unwrap().unwrap();
        let max_id: i64 = conn
            .query_row("SELECT MAX(id) FROM vip_subscriptions WHERE user_id = 6", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(active.id, max_id);
    }

    #[test]
    fn test_lapsed_subscription_is_not_active() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        conn.execute(
            "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
             VALUES (8, 'one_month', 50000, datetime('now', '-1 second'))",
            [],
        )
        .unwrap();

        assert!(get_active_subscription(&conn, 8).unwrap().is_none());
        assert!(!has_active_subscription(&conn, 8).unwrap());
    }

    #[test]
    fn test_songs_and_playlists_roundtrip() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        let song_id = create_song(
            &conn,
            "Gole Yakh",
            Some("Kourosh Yaghmaei"),
            Some("spotify"),
            Some("https://open.spotify.com/track/abc"),
            Some("/tmp/gole_yakh.mp3"),
            Some(252),
        )
        .unwrap();

        let by_url = get_song_by_url(&conn, "https://open.spotify.com/track/abc")
            .unwrap()
            .unwrap();
        assert_eq!(by_url.id, song_id);

        let playlist_id = create_playlist(&conn, 1, "Classics", None).unwrap();
        add_song_to_playlist(&conn, playlist_id, song_id).unwrap();
        let songs = get_playlist_songs(&conn, playlist_id).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Gole Yakh");

        remove_song_from_playlist(&conn, playlist_id, song_id).unwrap();
        assert!(get_playlist_songs(&conn, playlist_id).unwrap().is_empty());

        delete_playlist(&conn, playlist_id).unwrap();
        assert!(get_playlist(&conn, playlist_id).unwrap().is_none());
    }

    #[test]
    fn test_download_history_and_counts() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        add_download(&conn, 1, "music", Some("https://x/t"), 1000).unwrap();
        add_download(&conn, 1, "youtube", None, 2000).unwrap();

        let records = get_user_downloads(&conn, 1, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(count_downloads_today(&conn).unwrap(), 2);
    }

    #[test]
    fn test_required_channels_crud() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        add_required_channel(&conn, "@snexus_news", "Snexus News", "https://t.me/snexus_news", 1).unwrap();
        assert_eq!(count_required_channels(&conn).unwrap(), 1);

        let channels = get_required_channels(&conn).unwrap();
        assert_eq!(channels[0].channel_name, "Snexus News");

        delete_required_channel(&conn, "@snexus_news").unwrap();
        assert_eq!(count_required_channels(&conn).unwrap(), 0);
    }
}
