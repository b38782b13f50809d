//! Schema setup
//!
//! Idempotent: every statement is `CREATE ... IF NOT EXISTS`, so `run` is
//! safe to call on every start.

use sqlx::PgPool;

/// Tables in dependency order
const TABLES: &[(&str, &str)] = &[
    (
        "clients",
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            client_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            city TEXT,
            province TEXT,
            postal_code TEXT,
            country TEXT NOT NULL DEFAULT 'South Africa',
            industry TEXT,
            client_type TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            payment_terms TEXT,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "staff",
        r#"
        CREATE TABLE IF NOT EXISTS staff (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            employee_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            department TEXT,
            position TEXT,
            type TEXT NOT NULL DEFAULT 'FULL_TIME',
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            salary NUMERIC(12, 2),
            join_date DATE,
            skills TEXT[] NOT NULL DEFAULT '{}',
            certifications TEXT[] NOT NULL DEFAULT '{}',
            reports_to UUID REFERENCES staff(id) ON DELETE SET NULL,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "staff_performance",
        r#"
        CREATE TABLE IF NOT EXISTS staff_performance (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            staff_id UUID NOT NULL REFERENCES staff(id) ON DELETE CASCADE,
            period_start DATE NOT NULL,
            period_end DATE NOT NULL,
            productivity DOUBLE PRECISION,
            quality_score DOUBLE PRECISION,
            safety_score DOUBLE PRECISION,
            hours_worked DOUBLE PRECISION NOT NULL DEFAULT 0,
            tasks_completed INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (period_end >= period_start)
        )
        "#,
    ),
    (
        "projects",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            client_id UUID REFERENCES clients(id),
            project_manager_id UUID REFERENCES staff(id) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            priority TEXT NOT NULL DEFAULT 'MEDIUM',
            project_type TEXT,
            location TEXT,
            start_date DATE,
            end_date DATE,
            progress DOUBLE PRECISION NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            budget NUMERIC(15, 2),
            actual_cost NUMERIC(15, 2) NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "project_staff",
        r#"
        CREATE TABLE IF NOT EXISTS project_staff (
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            staff_id UUID NOT NULL REFERENCES staff(id) ON DELETE CASCADE,
            role TEXT,
            assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (project_id, staff_id)
        )
        "#,
    ),
    (
        "contractors",
        r#"
        CREATE TABLE IF NOT EXISTS contractors (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            company_name TEXT NOT NULL,
            registration_number TEXT NOT NULL UNIQUE,
            contact_person TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            physical_address TEXT,
            city TEXT,
            province TEXT,
            business_type TEXT,
            industry_category TEXT,
            years_in_business INTEGER,
            employee_count INTEGER,
            annual_turnover NUMERIC(15, 2),
            insurance_coverage NUMERIC(15, 2),
            bonding_capacity NUMERIC(15, 2),
            status TEXT NOT NULL DEFAULT 'pending',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            compliance_status TEXT NOT NULL DEFAULT 'pending',
            rag_overall TEXT NOT NULL DEFAULT 'amber',
            rag_financial TEXT NOT NULL DEFAULT 'amber',
            rag_compliance TEXT NOT NULL DEFAULT 'amber',
            rag_performance TEXT NOT NULL DEFAULT 'amber',
            rag_safety TEXT NOT NULL DEFAULT 'amber',
            rag_last_updated TIMESTAMPTZ,
            rag_updated_by TEXT,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "contractor_teams",
        r#"
        CREATE TABLE IF NOT EXISTS contractor_teams (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            team_name TEXT NOT NULL,
            team_type TEXT,
            specialization TEXT,
            max_capacity INTEGER NOT NULL DEFAULT 0,
            current_capacity INTEGER NOT NULL DEFAULT 0,
            availability TEXT NOT NULL DEFAULT 'available',
            base_location TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "team_members",
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            team_id UUID NOT NULL REFERENCES contractor_teams(id) ON DELETE CASCADE,
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            role TEXT NOT NULL,
            is_team_lead BOOLEAN NOT NULL DEFAULT FALSE,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "contractor_documents",
        r#"
        CREATE TABLE IF NOT EXISTS contractor_documents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            document_type TEXT NOT NULL,
            document_name TEXT NOT NULL,
            document_number TEXT,
            file_url TEXT,
            issue_date DATE,
            expiry_date DATE,
            status TEXT NOT NULL DEFAULT 'pending',
            verified_by TEXT,
            verified_at TIMESTAMPTZ,
            rejection_reason TEXT,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "project_assignments",
        r#"
        CREATE TABLE IF NOT EXISTS project_assignments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            team_id UUID REFERENCES contractor_teams(id) ON DELETE SET NULL,
            scope TEXT,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            actual_end_date DATE,
            contract_value NUMERIC(15, 2) NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'assigned',
            payment_status TEXT NOT NULL DEFAULT 'pending',
            progress_percentage INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (end_date >= start_date)
        )
        "#,
    ),
    (
        "contractor_safety_incidents",
        r#"
        CREATE TABLE IF NOT EXISTS contractor_safety_incidents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
            incident_date DATE NOT NULL DEFAULT CURRENT_DATE,
            severity TEXT NOT NULL,
            description TEXT NOT NULL,
            reported_by TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "contractor_rag_factors",
        r#"
        CREATE TABLE IF NOT EXISTS contractor_rag_factors (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            factor_type TEXT NOT NULL,
            factor_name TEXT NOT NULL,
            factor_value JSONB NOT NULL,
            impact_on_score TEXT,
            last_evaluated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (contractor_id, factor_type, factor_name)
        )
        "#,
    ),
    (
        "contractor_rag_history",
        r#"
        CREATE TABLE IF NOT EXISTS contractor_rag_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            contractor_id UUID NOT NULL REFERENCES contractors(id) ON DELETE CASCADE,
            score_type TEXT NOT NULL,
            old_score TEXT,
            new_score TEXT NOT NULL,
            reason TEXT,
            updated_by TEXT NOT NULL DEFAULT 'system',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "suppliers",
        r#"
        CREATE TABLE IF NOT EXISTS suppliers (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            supplier_code TEXT NOT NULL UNIQUE,
            company_name TEXT NOT NULL,
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            city TEXT,
            province TEXT,
            country TEXT NOT NULL DEFAULT 'South Africa',
            categories TEXT[] NOT NULL DEFAULT '{}',
            rating NUMERIC(3, 2),
            status TEXT NOT NULL DEFAULT 'active',
            preferred BOOLEAN NOT NULL DEFAULT FALSE,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "stock_positions",
        r#"
        CREATE TABLE IF NOT EXISTS stock_positions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            item_code TEXT NOT NULL,
            item_name TEXT NOT NULL,
            item_description TEXT,
            category TEXT,
            unit_of_measure TEXT NOT NULL DEFAULT 'each',
            available_quantity NUMERIC(14, 3) NOT NULL DEFAULT 0,
            reserved_quantity NUMERIC(14, 3) NOT NULL DEFAULT 0,
            total_quantity NUMERIC(14, 3) NOT NULL DEFAULT 0,
            reorder_point NUMERIC(14, 3),
            reorder_quantity NUMERIC(14, 3),
            maximum_stock_level NUMERIC(14, 3),
            unit_cost NUMERIC(14, 2) NOT NULL DEFAULT 0,
            total_value NUMERIC(16, 2) NOT NULL DEFAULT 0,
            warehouse_location TEXT,
            bin_location TEXT,
            stock_status TEXT NOT NULL DEFAULT 'in_stock',
            supplier_id UUID REFERENCES suppliers(id) ON DELETE SET NULL,
            last_movement_date TIMESTAMPTZ,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, item_code)
        )
        "#,
    ),
    (
        "stock_movements",
        r#"
        CREATE TABLE IF NOT EXISTS stock_movements (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            movement_type TEXT NOT NULL,
            reference_number TEXT,
            reference_type TEXT,
            from_location TEXT,
            to_location TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            reason TEXT,
            notes TEXT,
            created_by TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "stock_movement_items",
        r#"
        CREATE TABLE IF NOT EXISTS stock_movement_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            movement_id UUID NOT NULL REFERENCES stock_movements(id) ON DELETE CASCADE,
            item_code TEXT NOT NULL,
            item_name TEXT NOT NULL,
            planned_quantity NUMERIC(14, 3) NOT NULL,
            actual_quantity NUMERIC(14, 3),
            unit_cost NUMERIC(14, 2) NOT NULL DEFAULT 0,
            total_cost NUMERIC(16, 2) NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            lot_number TEXT,
            serial_numbers TEXT[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "cable_drums",
        r#"
        CREATE TABLE IF NOT EXISTS cable_drums (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            drum_number TEXT NOT NULL,
            cable_type TEXT NOT NULL,
            cable_size TEXT,
            supplier_id UUID REFERENCES suppliers(id) ON DELETE SET NULL,
            original_length NUMERIC(12, 2) NOT NULL,
            remaining_length NUMERIC(12, 2) NOT NULL,
            status TEXT NOT NULL DEFAULT 'available',
            location TEXT,
            notes TEXT,
            last_used_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, drum_number),
            CHECK (remaining_length >= 0 AND remaining_length <= original_length)
        )
        "#,
    ),
    (
        "cable_drum_usage",
        r#"
        CREATE TABLE IF NOT EXISTS cable_drum_usage (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            drum_id UUID NOT NULL REFERENCES cable_drums(id) ON DELETE CASCADE,
            length_used NUMERIC(12, 2) NOT NULL,
            used_for TEXT,
            used_by TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "rfqs",
        r#"
        CREATE TABLE IF NOT EXISTS rfqs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            rfq_number TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            issue_date DATE,
            response_deadline DATE,
            total_items INTEGER NOT NULL DEFAULT 0,
            invited_suppliers INTEGER NOT NULL DEFAULT 0,
            responses_received INTEGER NOT NULL DEFAULT 0,
            payment_terms TEXT,
            delivery_requirements TEXT,
            created_by TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "rfq_suppliers",
        r#"
        CREATE TABLE IF NOT EXISTS rfq_suppliers (
            rfq_id UUID NOT NULL REFERENCES rfqs(id) ON DELETE CASCADE,
            supplier_id UUID NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'invited',
            invited_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (rfq_id, supplier_id)
        )
        "#,
    ),
    (
        "rfq_supplier_history",
        r#"
        CREATE TABLE IF NOT EXISTS rfq_supplier_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            rfq_id UUID NOT NULL REFERENCES rfqs(id) ON DELETE CASCADE,
            supplier_id UUID NOT NULL,
            action TEXT NOT NULL,
            performed_by TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "boqs",
        r#"
        CREATE TABLE IF NOT EXISTS boqs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            version TEXT NOT NULL,
            title TEXT,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            mapping_status TEXT NOT NULL DEFAULT 'pending',
            mapping_confidence DOUBLE PRECISION,
            uploaded_by TEXT NOT NULL DEFAULT 'system',
            file_name TEXT,
            item_count INTEGER NOT NULL DEFAULT 0,
            mapped_items INTEGER NOT NULL DEFAULT 0,
            unmapped_items INTEGER NOT NULL DEFAULT 0,
            exceptions_count INTEGER NOT NULL DEFAULT 0,
            total_estimated_value NUMERIC(15, 2),
            currency TEXT NOT NULL DEFAULT 'ZAR',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, version)
        )
        "#,
    ),
    (
        "boq_items",
        r#"
        CREATE TABLE IF NOT EXISTS boq_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            boq_id UUID NOT NULL REFERENCES boqs(id) ON DELETE CASCADE,
            line_number INTEGER NOT NULL,
            item_code TEXT,
            description TEXT NOT NULL,
            unit TEXT,
            quantity NUMERIC(15, 4) NOT NULL DEFAULT 0,
            rate NUMERIC(15, 2),
            amount NUMERIC(15, 2),
            category TEXT,
            mapped_stock_id UUID REFERENCES stock_positions(id) ON DELETE SET NULL,
            mapping_confidence DOUBLE PRECISION,
            is_mapped BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "boq_exceptions",
        r#"
        CREATE TABLE IF NOT EXISTS boq_exceptions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            boq_id UUID NOT NULL REFERENCES boqs(id) ON DELETE CASCADE,
            boq_item_id UUID REFERENCES boq_items(id) ON DELETE CASCADE,
            exception_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            description TEXT NOT NULL,
            resolution_status TEXT NOT NULL DEFAULT 'pending',
            resolved_by TEXT,
            resolved_at TIMESTAMPTZ,
            resolution_notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "sow_poles",
        r#"
        CREATE TABLE IF NOT EXISTS sow_poles (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            pole_number TEXT NOT NULL,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            status TEXT NOT NULL DEFAULT 'pending',
            pole_type TEXT,
            pole_spec TEXT,
            height DOUBLE PRECISION,
            diameter DOUBLE PRECISION,
            owner TEXT,
            pon_no INTEGER,
            zone_no INTEGER,
            address TEXT,
            municipality TEXT,
            created_date TEXT,
            created_by TEXT,
            comments TEXT,
            raw_data JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, pole_number)
        )
        "#,
    ),
    (
        "sow_drops",
        r#"
        CREATE TABLE IF NOT EXISTS sow_drops (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            drop_number TEXT NOT NULL,
            pole_number TEXT,
            cable_type TEXT,
            cable_spec TEXT,
            cable_length TEXT,
            cable_capacity TEXT,
            start_point TEXT,
            end_point TEXT,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            address TEXT,
            pon_no INTEGER,
            zone_no INTEGER,
            municipality TEXT,
            status TEXT NOT NULL DEFAULT 'planned',
            created_date TEXT,
            created_by TEXT,
            raw_data JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, drop_number)
        )
        "#,
    ),
    (
        "sow_fibre",
        r#"
        CREATE TABLE IF NOT EXISTS sow_fibre (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            segment_id TEXT NOT NULL,
            cable_size TEXT,
            layer TEXT,
            distance DOUBLE PRECISION NOT NULL DEFAULT 0,
            pon_no INTEGER,
            zone_no INTEGER,
            string_completed DOUBLE PRECISION,
            date_completed TEXT,
            contractor TEXT,
            status TEXT NOT NULL DEFAULT 'planned',
            is_complete BOOLEAN NOT NULL DEFAULT FALSE,
            raw_data JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (project_id, segment_id)
        )
        "#,
    ),
    (
        "sow_project_summary",
        r#"
        CREATE TABLE IF NOT EXISTS sow_project_summary (
            project_id UUID PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
            total_poles BIGINT NOT NULL DEFAULT 0,
            total_drops BIGINT NOT NULL DEFAULT 0,
            total_fibre_segments BIGINT NOT NULL DEFAULT 0,
            total_fibre_length DOUBLE PRECISION NOT NULL DEFAULT 0,
            completed_fibre_length DOUBLE PRECISION NOT NULL DEFAULT 0,
            poles_with_drops BIGINT NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "sow_import_status",
        r#"
        CREATE TABLE IF NOT EXISTS sow_import_status (
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            import_type TEXT NOT NULL,
            status TEXT NOT NULL,
            records_imported BIGINT NOT NULL DEFAULT 0,
            error_count BIGINT NOT NULL DEFAULT 0,
            errors JSONB NOT NULL DEFAULT '[]',
            imported_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (project_id, import_type)
        )
        "#,
    ),
    (
        "kpi_metrics",
        r#"
        CREATE TABLE IF NOT EXISTS kpi_metrics (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
            metric_type TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            metric_value DOUBLE PRECISION NOT NULL,
            unit TEXT,
            recorded_date DATE NOT NULL DEFAULT CURRENT_DATE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "kpi_targets",
        r#"
        CREATE TABLE IF NOT EXISTS kpi_targets (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            kpi_id TEXT NOT NULL UNIQUE,
            target_value DOUBLE PRECISION NOT NULL,
            unit TEXT,
            period TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "generated_reports",
        r#"
        CREATE TABLE IF NOT EXISTS generated_reports (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            report_type TEXT NOT NULL,
            parameters JSONB NOT NULL DEFAULT '{}',
            generated_by TEXT NOT NULL DEFAULT 'system',
            generated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "onemap_import_batches",
        r#"
        CREATE TABLE IF NOT EXISTS onemap_import_batches (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing',
            total_rows BIGINT NOT NULL DEFAULT 0,
            new_records BIGINT NOT NULL DEFAULT 0,
            updated_records BIGINT NOT NULL DEFAULT 0,
            duplicate_count BIGINT NOT NULL DEFAULT 0,
            verification_passed BOOLEAN,
            error_message TEXT,
            started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            completed_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "onemap_imports",
        r#"
        CREATE TABLE IF NOT EXISTS onemap_imports (
            property_id TEXT PRIMARY KEY,
            pole_number TEXT,
            drop_number TEXT,
            status TEXT,
            normalized_status TEXT,
            tracking_type TEXT NOT NULL,
            tracking_value TEXT NOT NULL,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            address TEXT,
            last_modified TIMESTAMPTZ,
            raw_data JSONB NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            import_batch_id TEXT REFERENCES onemap_import_batches(id) ON DELETE SET NULL,
            first_seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "onemap_change_history",
        r#"
        CREATE TABLE IF NOT EXISTS onemap_change_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            property_id TEXT NOT NULL,
            import_batch_id TEXT NOT NULL,
            change_type TEXT NOT NULL,
            old_status TEXT,
            new_status TEXT,
            tracking_value TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "onemap_first_instances",
        r#"
        CREATE TABLE IF NOT EXISTS onemap_first_instances (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            pole_number TEXT NOT NULL,
            normalized_status TEXT NOT NULL,
            milestone TEXT,
            property_id TEXT NOT NULL,
            import_batch_id TEXT NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (pole_number, normalized_status)
        )
        "#,
    ),
    (
        "onemap_import_reports",
        r#"
        CREATE TABLE IF NOT EXISTS onemap_import_reports (
            batch_id TEXT PRIMARY KEY REFERENCES onemap_import_batches(id) ON DELETE CASCADE,
            report JSONB NOT NULL,
            report_text TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "search_history",
        r#"
        CREATE TABLE IF NOT EXISTS search_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            query TEXT NOT NULL,
            result_count BIGINT NOT NULL DEFAULT 0,
            searched_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_clients_status ON clients(status)",
    "CREATE INDEX IF NOT EXISTS idx_staff_department ON staff(department)",
    "CREATE INDEX IF NOT EXISTS idx_staff_status ON staff(status)",
    "CREATE INDEX IF NOT EXISTS idx_staff_performance_staff ON staff_performance(staff_id, period_start)",
    "CREATE INDEX IF NOT EXISTS idx_projects_client ON projects(client_id)",
    "CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status)",
    "CREATE INDEX IF NOT EXISTS idx_contractors_status ON contractors(status)",
    "CREATE INDEX IF NOT EXISTS idx_contractors_rag ON contractors(rag_overall)",
    "CREATE INDEX IF NOT EXISTS idx_contractor_teams_contractor ON contractor_teams(contractor_id)",
    "CREATE INDEX IF NOT EXISTS idx_contractor_documents_contractor ON contractor_documents(contractor_id, document_type)",
    "CREATE INDEX IF NOT EXISTS idx_contractor_documents_expiry ON contractor_documents(expiry_date)",
    "CREATE INDEX IF NOT EXISTS idx_project_assignments_contractor ON project_assignments(contractor_id)",
    "CREATE INDEX IF NOT EXISTS idx_safety_incidents_contractor ON contractor_safety_incidents(contractor_id, incident_date)",
    "CREATE INDEX IF NOT EXISTS idx_rag_history_contractor ON contractor_rag_history(contractor_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_stock_positions_project ON stock_positions(project_id, category)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_project ON stock_movements(project_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movement_items_movement ON stock_movement_items(movement_id)",
    "CREATE INDEX IF NOT EXISTS idx_cable_drums_project ON cable_drums(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_rfqs_project ON rfqs(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_boqs_project ON boqs(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_boq_items_boq ON boq_items(boq_id, line_number)",
    "CREATE INDEX IF NOT EXISTS idx_boq_exceptions_boq ON boq_exceptions(boq_id)",
    "CREATE INDEX IF NOT EXISTS idx_sow_drops_pole ON sow_drops(project_id, pole_number)",
    "CREATE INDEX IF NOT EXISTS idx_sow_fibre_contractor ON sow_fibre(project_id, contractor)",
    "CREATE INDEX IF NOT EXISTS idx_kpi_metrics_type_date ON kpi_metrics(metric_type, recorded_date)",
    "CREATE INDEX IF NOT EXISTS idx_onemap_imports_pole ON onemap_imports(pole_number)",
    "CREATE INDEX IF NOT EXISTS idx_onemap_change_history_batch ON onemap_change_history(import_batch_id)",
];

/// Create every table and index.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running migrations...");

    for (name, ddl) in TABLES {
        tracing::debug!(table = name, "ensuring table");
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!(
        tables = TABLES.len(),
        indexes = INDEXES.len(),
        "Migrations complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_is_idempotent() {
        for (name, ddl) in TABLES {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", name)),
                "{} ddl does not match its name",
                name
            );
        }
        assert!(INDEXES.iter().all(|i| i.starts_with("CREATE INDEX IF NOT EXISTS")));
    }

    #[test]
    fn referenced_tables_come_first() {
        let names: Vec<&str> = TABLES.iter().map(|(n, _)| *n).collect();
        for (idx, (_, ddl)) in TABLES.iter().enumerate() {
            for referenced in ddl.split("REFERENCES ").skip(1) {
                let target = referenced.split('(').next().unwrap_or_default().trim();
                let pos = names.iter().position(|n| *n == target);
                assert!(
                    pos.is_some_and(|p| p <= idx),
                    "{} referenced before creation",
                    target
                );
            }
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_run_twice() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
    }
}
