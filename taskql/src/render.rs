//! Rendering statements to parameterized SQL text

use crate::ast::*;

impl Statement {
    pub fn render(&self) -> Sql {
        match self {
            Statement::CreateTable(s) => s.render(),
            Statement::CreateIndex(s) => s.render(),
            Statement::AlterTable(s) => s.render(),
            Statement::DropTable(s) => s.render(),
            Statement::DropIndex(s) => s.render(),
            Statement::Insert(s) => s.render(),
            Statement::Update(s) => s.render(),
            Statement::Delete(s) => s.render(),
            Statement::Select(s) => s.render(),
        }
    }
}

impl CreateTable {
    pub fn render(&self) -> Sql {
        let mut defs: Vec<String> = self.columns.iter().map(ColumnSpec::definition).collect();
        defs.extend(self.foreign_keys.iter().map(ForeignKey::clause));
        Sql::new(format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            defs.join(", ")
        ))
    }
}

impl CreateIndex {
    pub fn render(&self) -> Sql {
        Sql::new(format!(
            "CREATE {}INDEX {}{} ON {}({})",
            if self.unique { "UNIQUE " } else { "" },
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            self.table,
            self.columns.join(", ")
        ))
    }
}

impl AlterTable {
    pub fn render(&self) -> Sql {
        match &self.action {
            AlterAction::AddColumn(column) => {
                Sql::new(format!("ALTER TABLE {} ADD COLUMN {}", self.table, column.definition()))
            }
            AlterAction::RenameTo(name) => Sql::new(format!("ALTER TABLE {} RENAME TO {}", self.table, name)),
        }
    }
}

impl DropTable {
    pub fn render(&self) -> Sql {
        Sql::new(format!(
            "DROP TABLE {}{}",
            if self.if_exists { "IF EXISTS " } else { "" },
            self.name
        ))
    }
}

impl DropIndex {
    pub fn render(&self) -> Sql {
        Sql::new(format!(
            "DROP INDEX {}{}",
            if self.if_exists { "IF EXISTS " } else { "" },
            self.name
        ))
    }
}

impl Insert {
    pub fn render(&self) -> Sql {
        let placeholders = vec!["?"; self.values.len()].join(", ");
        Sql::with_params(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.columns.join(", "),
                placeholders
            ),
            self.values.clone(),
        )
    }
}

impl Update {
    pub fn render(&self) -> Sql {
        let mut params: Vec<Value> = Vec::with_capacity(self.assignments.len());
        let set: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!("{} = ?", column)
            })
            .collect();
        let mut text = format!("UPDATE {} SET {}", self.table, set.join(", "));
        self.filter.append_to(&mut text, &mut params);
        Sql::with_params(text, params)
    }
}

impl Delete {
    pub fn render(&self) -> Sql {
        let mut text = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();
        self.filter.append_to(&mut text, &mut params);
        Sql::with_params(text, params)
    }
}

impl Select {
    pub fn render(&self) -> Sql {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut text = format!("SELECT {} FROM {}", columns, self.table);
        let mut params = Vec::new();

        for join in &self.joins {
            text.push_str(&format!(
                " JOIN {} ON {} = {}.{}",
                join.table, join.left, join.table, join.right
            ));
        }

        self.filter.append_to(&mut text, &mut params);

        if !self.group_by.is_empty() {
            text.push_str(" GROUP BY ");
            text.push_str(&self.group_by.join(", "));
        }

        if let Some((clause, having_params)) = &self.having {
            text.push_str(" HAVING ");
            text.push_str(clause);
            params.extend(having_params.iter().cloned());
        }

        if let Some(order) = &self.order_by {
            if !order.columns.is_empty() {
                text.push_str(&format!(
                    " ORDER BY {} {}",
                    order.columns.join(", "),
                    order.direction.as_sql()
                ));
            }
        }

        if let Some(limit) = self.limit {
            text.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = self.offset {
                text.push_str(&format!(" OFFSET {}", offset));
            }
        }

        Sql::with_params(text, params)
    }
}
