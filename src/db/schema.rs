use rusqlite::Connection;

/// Initialize the entitlement store schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Viewer profiles. Identity itself lives with the auth provider;
        -- subscription_* mirror the latest activation for single-row reads.
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'reader' CHECK (role IN ('reader', 'author', 'admin')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'suspended', 'disabled')),
            subscription_status TEXT,
            subscription_expires_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS authors (
            user_id TEXT PRIMARY KEY,
            premium INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            plan_id TEXT NOT NULL CHECK (plan_id IN ('reader_monthly', 'author_monthly')),
            status TEXT NOT NULL CHECK (status IN ('active', 'canceled', 'expired')),
            renews_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, plan_id)
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);

        CREATE TABLE IF NOT EXISTS course_enrollments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_enrollments_user ON course_enrollments(user_id);

        -- Payment log. (provider, provider_ref) is the idempotency key;
        -- rows are never rewritten except for status reconciliation.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            provider_ref TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            event TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(provider, provider_ref)
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);

        -- Checkout intent recorded at initiation, keyed by tx_ref.
        CREATE TABLE IF NOT EXISTS checkouts (
            tx_ref TEXT PRIMARY KEY,
            purpose TEXT NOT NULL CHECK (purpose IN ('reader_subscription', 'author_premium', 'course_purchase')),
            user_id TEXT NOT NULL,
            course_id TEXT,
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_checkouts_pending ON checkouts(created_at) WHERE completed_at IS NULL;

        CREATE TABLE IF NOT EXISTS storage_buckets (
            name TEXT PRIMARY KEY,
            public INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        "#,
    )
}
