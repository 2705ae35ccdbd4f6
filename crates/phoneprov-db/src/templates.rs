//! Template and template variable queries.

use phoneprov_core::template::Template;
use phoneprov_core::template_vars::{TemplateVariable, VarType};
use rusqlite::{Row, params};
use tracing::warn;

use crate::{Database, DbError, DbResult};

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn variable_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateVariable> {
    let var_type: String = row.get(3)?;
    let options: Option<String> = row.get(9)?;
    let options = match options.as_deref() {
        None | Some("") => Vec::new(),
        Some(json) => serde_json::from_str(json).unwrap_or_else(|error| {
            warn!(%error, "Discarding unreadable options JSON");
            Vec::new()
        }),
    };

    Ok(TemplateVariable {
        id: row.get(0)?,
        template_id: row.get(1)?,
        name: row.get(2)?,
        var_type: VarType::parse(&var_type).unwrap_or(VarType::Text),
        default_value: row.get(4)?,
        required: row.get(5)?,
        validation_regex: row.get(6)?,
        min_value: row.get(7)?,
        max_value: row.get(8)?,
        options,
        parent_id: row.get(10)?,
        visible_when: row.get(11)?,
    })
}

impl Database {
    /// Create a template.
    pub fn create_template(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> DbResult<Template> {
        self.conn.execute(
            "INSERT INTO templates (name, content, description) VALUES (?, ?, ?)",
            params![name, content, description],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_template(id)?.ok_or_else(|| DbError::NotFound(format!("template {id}")))
    }

    /// Update a template's content and metadata.
    pub fn update_template(
        &self,
        id: i64,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> DbResult<Template> {
        let updated = self.conn.execute(
            r"UPDATE templates SET
                name = ?,
                content = ?,
                description = ?,
                updated_at = datetime('now')
              WHERE id = ?",
            params![name, content, description, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("template {id}")));
        }
        self.get_template(id)?.ok_or_else(|| DbError::NotFound(format!("template {id}")))
    }

    /// Load a template by id.
    pub fn get_template(&self, id: i64) -> DbResult<Option<Template>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, content, description, created_at, updated_at
             FROM templates WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id], template_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List all templates.
    pub fn list_templates(&self) -> DbResult<Vec<Template>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, content, description, created_at, updated_at
             FROM templates ORDER BY name",
        )?;
        let templates = stmt.query_map([], template_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(templates)
    }

    /// Delete a template and its variable declarations.
    pub fn delete_template(&self, id: i64) -> DbResult<bool> {
        let deleted = self.conn.execute("DELETE FROM templates WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// List a template's variable declarations.
    pub fn list_template_variables(&self, template_id: i64) -> DbResult<Vec<TemplateVariable>> {
        let mut stmt = self.conn.prepare(
            r"SELECT id, template_id, name, var_type, default_value, required,
                     validation_regex, min_value, max_value, options, parent_id, visible_when
              FROM template_variables WHERE template_id = ? ORDER BY name",
        )?;
        let variables =
            stmt.query_map(params![template_id], variable_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(variables)
    }

    /// Create or update a variable declaration, keyed by (template, name).
    pub fn save_template_variable(&self, decl: &TemplateVariable) -> DbResult<i64> {
        decl.validate_declaration()?;

        let options = if decl.options.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&decl.options).map_err(|err| {
                DbError::Serialization(format!("Failed to encode options: {err}"))
            })?)
        };

        self.conn.execute(
            r"INSERT INTO template_variables
                (template_id, name, var_type, default_value, required,
                 validation_regex, min_value, max_value, options, parent_id, visible_when)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(template_id, name) DO UPDATE SET
                var_type = excluded.var_type,
                default_value = excluded.default_value,
                required = excluded.required,
                validation_regex = excluded.validation_regex,
                min_value = excluded.min_value,
                max_value = excluded.max_value,
                options = excluded.options,
                parent_id = excluded.parent_id,
                visible_when = excluded.visible_when",
            params![
                decl.template_id,
                decl.name,
                decl.var_type.as_str(),
                decl.default_value,
                decl.required,
                decl.validation_regex,
                decl.min_value,
                decl.max_value,
                options,
                decl.parent_id,
                decl.visible_when,
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM template_variables WHERE template_id = ? AND name = ?",
            params![decl.template_id, decl.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Delete a variable declaration.
    pub fn delete_template_variable(&self, id: i64) -> DbResult<bool> {
        let deleted =
            self.conn.execute("DELETE FROM template_variables WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn decl(template_id: i64, name: &str) -> TemplateVariable {
        TemplateVariable {
            id: 0,
            template_id,
            name: name.to_string(),
            var_type: VarType::Text,
            default_value: None,
            required: false,
            validation_regex: None,
            min_value: None,
            max_value: None,
            options: Vec::new(),
            parent_id: None,
            visible_when: None,
        }
    }

    #[test]
    fn test_template_crud() {
        let db = test_db();
        let template = db
            .create_template("yealink-base", "host={{PABX_HOST}}\n", Some("baseline"))
            .expect("Failed to create template");
        assert_eq!(template.name, "yealink-base");

        let updated = db
            .update_template(template.id, "yealink-base", "host={{PABX_HOST}}\nvlan=7\n", None)
            .unwrap();
        assert!(updated.content.contains("vlan=7"));

        assert_eq!(db.list_templates().unwrap().len(), 1);
        assert!(db.delete_template(template.id).unwrap());
        assert!(db.get_template(template.id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_template_is_not_found() {
        let db = test_db();
        assert_matches!(db.update_template(42, "x", "y", None), Err(DbError::NotFound(_)));
    }

    #[test]
    fn test_variable_declaration_round_trip() {
        let db = test_db();
        let template = db.create_template("base", "{{CODEC}}", None).unwrap();

        let mut codec = decl(template.id, "CODEC");
        codec.var_type = VarType::Select;
        codec.options = vec!["alaw".to_string(), "ulaw".to_string()];
        codec.default_value = Some("alaw".to_string());
        db.save_template_variable(&codec).expect("Failed to save declaration");

        let loaded = db.list_template_variables(template.id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].var_type, VarType::Select);
        assert_eq!(loaded[0].options, vec!["alaw".to_string(), "ulaw".to_string()]);
        assert_eq!(loaded[0].default_value.as_deref(), Some("alaw"));
    }

    #[test]
    fn test_saving_same_name_updates_in_place() {
        let db = test_db();
        let template = db.create_template("base", "{{NTP_HOST}}", None).unwrap();

        let mut host = decl(template.id, "NTP_HOST");
        host.default_value = Some("pool.ntp.org".to_string());
        let first_id = db.save_template_variable(&host).unwrap();

        host.default_value = Some("10.0.0.1".to_string());
        let second_id = db.save_template_variable(&host).unwrap();

        assert_eq!(first_id, second_id);
        let loaded = db.list_template_variables(template.id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].default_value.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_invalid_declaration_rejected_before_write() {
        let db = test_db();
        let template = db.create_template("base", "", None).unwrap();

        let bad = decl(template.id, "not-a-key");
        assert_matches!(db.save_template_variable(&bad), Err(DbError::Domain(_)));
        assert!(db.list_template_variables(template.id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_var_type_falls_back_to_text() {
        let db = test_db();
        let template = db.create_template("base", "", None).unwrap();
        db.conn()
            .execute(
                "INSERT INTO template_variables (template_id, name, var_type) VALUES (?, ?, 'json')",
                params![template.id, "ODD_ONE"],
            )
            .unwrap();

        let loaded = db.list_template_variables(template.id).unwrap();
        assert_eq!(loaded[0].var_type, VarType::Text);
    }

    #[test]
    fn test_deleting_template_cascades_declarations() {
        let db = test_db();
        let template = db.create_template("base", "", None).unwrap();
        db.save_template_variable(&decl(template.id, "A")).unwrap();

        db.delete_template(template.id).unwrap();
        assert!(db.list_template_variables(template.id).unwrap().is_empty());
    }
}
