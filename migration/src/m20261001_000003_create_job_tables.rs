use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TYPE shadow.job_event_status AS ENUM (
                'pending',
                'running',
                'completed',
                'failed'
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.job_events (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(64) NOT NULL,
                payload JSONB NOT NULL,
                status shadow.job_event_status NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                run_after TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_error TEXT,
                output JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // Workers poll for the oldest due pending event
        db.execute_unprepared(
            "CREATE INDEX job_events_pending_run_after_idx
                ON shadow.job_events (run_after, created_at)
                WHERE status = 'pending'",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX job_events_running_updated_at_idx
                ON shadow.job_events (updated_at)
                WHERE status = 'running'",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE shadow.job_steps (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                job_event_id UUID NOT NULL REFERENCES shadow.job_events(id) ON DELETE CASCADE,
                step_key VARCHAR(128) NOT NULL,
                output JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT job_steps_job_event_id_step_key_key UNIQUE (job_event_id, step_key)
            )",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS shadow.job_steps")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS shadow.job_events")
            .await?;
        db.execute_unprepared("DROP TYPE IF EXISTS shadow.job_event_status")
            .await?;

        Ok(())
    }
}
