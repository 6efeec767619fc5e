//! Migration: Create images table.
//!
//! Image records and their processing status.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TABLE images (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting

                    filename VARCHAR(500) NOT NULL,      -- name as uploaded
                    original_path TEXT NOT NULL,         -- location under the uploads root

                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'processed', 'failed')),

                    -- Derived artifacts, set only when that transformation succeeded
                    processed_path_resize TEXT,
                    processed_path_thumbnail TEXT,
                    processed_path_watermark TEXT,

                    -- Recovery bookkeeping
                    requeue_count INTEGER NOT NULL DEFAULT 0,
                    last_error TEXT,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for the stale-pending sweep
                CREATE INDEX idx_images_status_updated_at ON images(status, updated_at);

                -- Trigger to update updated_at
                CREATE TRIGGER update_images_updated_at
                    BEFORE UPDATE ON images
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_images_updated_at ON images;
                DROP TABLE IF EXISTS images CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
