use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const ENUMS: &[(&str, &[&str])] = &[
    ("meeting_status", &["scheduled", "active", "completed", "cancelled"]),
    ("recording_status", &["processing", "ready", "failed"]),
    ("transcript_status", &["processing", "ready", "failed"]),
    (
        "notification_type",
        &["meeting_reminder", "meeting_invite", "friend_request", "system"],
    ),
    ("subscription_plan", &["free", "pro", "enterprise"]),
    ("subscription_status", &["active", "cancelled", "expired"]),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, values) in ENUMS {
            let values = values
                .iter()
                .map(|v| format!("'{v}'"))
                .collect::<Vec<_>>()
                .join(", ");
            db.execute_unprepared(&format!("CREATE TYPE shadow.{name} AS ENUM ({values})"))
                .await?;
        }

        db.execute_unprepared(
            "CREATE TABLE shadow.users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) UNIQUE,
                name VARCHAR(255),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.meetings (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES shadow.users(id) ON DELETE CASCADE,
                title VARCHAR(255) NOT NULL,
                status shadow.meeting_status NOT NULL DEFAULT 'scheduled',
                scheduled_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.recordings (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                meeting_id UUID NOT NULL REFERENCES shadow.meetings(id) ON DELETE CASCADE,
                file_url TEXT,
                file_size BIGINT,
                duration_seconds INTEGER,
                format VARCHAR(32),
                status shadow.recording_status NOT NULL DEFAULT 'processing',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.transcripts (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                meeting_id UUID NOT NULL REFERENCES shadow.meetings(id) ON DELETE CASCADE,
                recording_id UUID NOT NULL REFERENCES shadow.recordings(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                language VARCHAR(16) NOT NULL,
                word_count INTEGER NOT NULL DEFAULT 0,
                status shadow.transcript_status NOT NULL DEFAULT 'processing',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.transcript_summaries (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                transcript_id UUID NOT NULL UNIQUE REFERENCES shadow.transcripts(id) ON DELETE CASCADE,
                summary TEXT NOT NULL,
                key_points JSONB,
                action_items JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.notifications (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES shadow.users(id) ON DELETE CASCADE,
                type shadow.notification_type NOT NULL,
                from_user_id UUID REFERENCES shadow.users(id) ON DELETE SET NULL,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                is_read BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.subscriptions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES shadow.users(id) ON DELETE CASCADE,
                external_subscription_id VARCHAR(255) UNIQUE,
                plan shadow.subscription_plan NOT NULL DEFAULT 'free',
                status shadow.subscription_status NOT NULL DEFAULT 'active',
                current_period_start TIMESTAMPTZ,
                current_period_end TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // The cleaner scans recordings by age; the generator looks up the
        // latest transcript of a meeting.
        db.execute_unprepared(
            "CREATE INDEX recordings_created_at_idx ON shadow.recordings (created_at)",
        )
        .await?;
        db.execute_unprepared(
            "CREATE INDEX transcripts_meeting_id_created_at_idx
                ON shadow.transcripts (meeting_id, created_at DESC)",
        )
        .await?;
        db.execute_unprepared(
            "CREATE INDEX notifications_user_id_created_at_idx
                ON shadow.notifications (user_id, created_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for table in [
            "subscriptions",
            "notifications",
            "transcript_summaries",
            "transcripts",
            "recordings",
            "meetings",
            "users",
        ] {
            db.execute_unprepared(&format!("DROP TABLE IF EXISTS shadow.{table}"))
                .await?;
        }

        for (name, _) in ENUMS.iter().rev() {
            db.execute_unprepared(&format!("DROP TYPE IF EXISTS shadow.{name}"))
                .await?;
        }

        Ok(())
    }
}
