use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tickers (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 3 CHECK (priority BETWEEN 1 AND 5),
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS content_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            published_at TEXT NOT NULL,
            source TEXT NOT NULL,
            content_type TEXT NOT NULL,
            url TEXT,
            author TEXT,
            company_name TEXT,
            ticker TEXT REFERENCES tickers(code),
            upvotes INTEGER,
            comments INTEGER,
            subchannel TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL,
            notified_at TEXT,
            UNIQUE (title, published_at, source)
        );

        CREATE TABLE IF NOT EXISTS models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            provider TEXT NOT NULL,
            model_identifier TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            description TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ab_configs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_a_id INTEGER NOT NULL REFERENCES models(id),
            model_b_id INTEGER NOT NULL REFERENCES models(id),
            active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            CHECK (model_a_id <> model_b_id)
        );

        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
            model_id INTEGER NOT NULL REFERENCES models(id),
            ticker_code TEXT NOT NULL,
            sentiment_direction TEXT NOT NULL,
            sentiment_score REAL NOT NULL,
            impact_level TEXT NOT NULL,
            relevance_score REAL NOT NULL,
            urgency_level TEXT NOT NULL,
            impact_analysis TEXT NOT NULL DEFAULT '{}',
            reasoning TEXT NOT NULL DEFAULT '',
            base_price REAL,
            target_horizon TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (content_item_id, model_id)
        );

        CREATE TABLE IF NOT EXISTS embeddings (
            content_item_id INTEGER PRIMARY KEY REFERENCES content_items(id) ON DELETE CASCADE,
            vector BLOB NOT NULL,
            dimension INTEGER NOT NULL,
            ticker_code TEXT,
            published_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ohlcv_daily (
            code TEXT NOT NULL,
            date TEXT NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume INTEGER NOT NULL,
            UNIQUE (code, date)
        );

        CREATE TABLE IF NOT EXISTS ohlcv_minute (
            code TEXT NOT NULL,
            datetime TEXT NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume INTEGER NOT NULL,
            UNIQUE (code, datetime)
        );

        CREATE TABLE IF NOT EXISTS orderbook (
            code TEXT NOT NULL,
            datetime TEXT NOT NULL,
            ask_prices TEXT NOT NULL,
            ask_volumes TEXT NOT NULL,
            bid_prices TEXT NOT NULL,
            bid_volumes TEXT NOT NULL,
            total_ask_volume INTEGER NOT NULL,
            total_bid_volume INTEGER NOT NULL,
            UNIQUE (code, datetime)
        );

        CREATE TABLE IF NOT EXISTS current_price (
            code TEXT NOT NULL,
            datetime TEXT NOT NULL,
            price REAL NOT NULL,
            open REAL,
            high REAL,
            low REAL,
            change REAL,
            change_sign TEXT,
            change_rate REAL,
            volume INTEGER,
            trading_value INTEGER,
            UNIQUE (code, datetime)
        );

        CREATE TABLE IF NOT EXISTS investor_flow (
            code TEXT NOT NULL,
            date TEXT NOT NULL,
            close REAL,
            individual_net_qty INTEGER NOT NULL,
            foreign_net_qty INTEGER NOT NULL,
            institution_net_qty INTEGER NOT NULL,
            individual_net_value INTEGER NOT NULL,
            foreign_net_value INTEGER NOT NULL,
            institution_net_value INTEGER NOT NULL,
            UNIQUE (code, date)
        );

        CREATE TABLE IF NOT EXISTS sector_index (
            sector_code TEXT NOT NULL,
            datetime TEXT NOT NULL,
            value REAL NOT NULL,
            change REAL,
            change_rate REAL,
            volume INTEGER,
            trading_value INTEGER,
            UNIQUE (sector_code, datetime)
        );

        CREATE TABLE IF NOT EXISTS overtime_price (
            code TEXT NOT NULL,
            date TEXT NOT NULL,
            price REAL NOT NULL,
            change REAL,
            change_sign TEXT,
            change_rate REAL,
            volume INTEGER,
            trading_value INTEGER,
            UNIQUE (code, date)
        );

        CREATE TABLE IF NOT EXISTS index_daily (
            index_code TEXT NOT NULL,
            index_name TEXT,
            date TEXT NOT NULL,
            open REAL,
            high REAL,
            low REAL,
            close REAL NOT NULL,
            volume INTEGER,
            trading_value INTEGER,
            change REAL,
            change_rate REAL,
            UNIQUE (index_code, date)
        );

        CREATE TABLE IF NOT EXISTS stock_info (
            code TEXT PRIMARY KEY,
            name TEXT,
            industry_code TEXT,
            industry_name TEXT,
            market_cap INTEGER,
            listed_shares INTEGER,
            capital INTEGER,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS news_price_match (
            content_item_id INTEGER PRIMARY KEY REFERENCES content_items(id) ON DELETE CASCADE,
            ticker_code TEXT NOT NULL,
            change_1d REAL,
            change_2d REAL,
            change_3d REAL,
            change_5d REAL,
            change_10d REAL,
            change_20d REAL,
            calculated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS analysis_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker_code TEXT NOT NULL,
            overall_summary TEXT NOT NULL,
            short_term_scenario TEXT,
            medium_term_scenario TEXT,
            long_term_scenario TEXT,
            risk_factors TEXT NOT NULL DEFAULT '[]',
            opportunity_factors TEXT NOT NULL DEFAULT '[]',
            recommendation TEXT,
            short_term_target_price REAL,
            short_term_support_price REAL,
            medium_term_target_price REAL,
            medium_term_support_price REAL,
            long_term_target_price REAL,
            base_price REAL,
            up_count INTEGER NOT NULL DEFAULT 0,
            down_count INTEGER NOT NULL DEFAULT 0,
            hold_count INTEGER NOT NULL DEFAULT 0,
            avg_confidence REAL,
            total_predictions INTEGER NOT NULL DEFAULT 0,
            custom_data TEXT,
            last_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS model_evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL REFERENCES analysis_summaries(id),
            model_id INTEGER NOT NULL REFERENCES models(id),
            ticker_code TEXT NOT NULL,
            predicted_at TEXT NOT NULL,
            base_price REAL NOT NULL,
            predicted_target REAL NOT NULL,
            predicted_support REAL NOT NULL,
            actual_high_1d REAL,
            actual_low_1d REAL,
            actual_close_1d REAL,
            actual_high_5d REAL,
            actual_low_5d REAL,
            actual_close_5d REAL,
            target_achieved INTEGER NOT NULL,
            target_achieved_days INTEGER,
            support_breached INTEGER NOT NULL,
            target_accuracy_score REAL NOT NULL,
            timing_score REAL NOT NULL,
            risk_management_score REAL NOT NULL,
            human_rating_quality INTEGER,
            human_rating_usefulness INTEGER,
            human_rating_overall INTEGER,
            human_evaluated_at TEXT,
            final_score REAL NOT NULL,
            evaluated_at TEXT NOT NULL,
            UNIQUE (report_id, model_id)
        );

        CREATE TABLE IF NOT EXISTS daily_model_performance (
            model_id INTEGER NOT NULL REFERENCES models(id),
            date TEXT NOT NULL,
            total_predictions INTEGER NOT NULL,
            evaluated_count INTEGER NOT NULL,
            human_evaluated_count INTEGER NOT NULL,
            avg_final_score REAL,
            avg_auto_score REAL,
            avg_human_score REAL,
            avg_target_accuracy REAL,
            avg_timing_score REAL,
            avg_risk_management REAL,
            target_achieved_rate REAL NOT NULL,
            support_breach_rate REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (model_id, date)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_ab_single_active ON ab_configs(active) WHERE active = 1;
        CREATE INDEX IF NOT EXISTS idx_content_created ON content_items(created_at);
        CREATE INDEX IF NOT EXISTS idx_content_ticker ON content_items(ticker);
        CREATE INDEX IF NOT EXISTS idx_predictions_ticker ON predictions(ticker_code, created_at);
        CREATE INDEX IF NOT EXISTS idx_embeddings_ticker ON embeddings(ticker_code);
        CREATE INDEX IF NOT EXISTS idx_summaries_ticker ON analysis_summaries(ticker_code, last_updated);
        "
    ).map_err(|e| format!("Migration failed: {e}"))
}
