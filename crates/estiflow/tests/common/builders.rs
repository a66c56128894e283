//! Builder for test job specs without repetitive boilerplate.

#![allow(dead_code)]

use estiflow::job::{Attachment, Customer, JobSpec, LineItem, Project, ProjectSource};

pub struct JobSpecBuilder {
    job_id: String,
    customer_name: String,
    customer_email: Option<String>,
    crm_key: Option<String>,
    site: String,
    due_date: Option<String>,
    line_items: Vec<LineItem>,
    attachments: Option<Vec<Attachment>>,
    tags: Option<Vec<String>>,
}

impl JobSpecBuilder {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            customer_name: "Acme Builders Ltd.".to_string(),
            customer_email: None,
            crm_key: None,
            site: "123 Industrial Rd".to_string(),
            due_date: None,
            line_items: vec![LineItem {
                room: "Warehouse".to_string(),
                opening: "dock".to_string(),
                size: "10x10".to_string(),
                qty: 1,
                spec: "PVC liner".to_string(),
                price: Some(1450.0),
            }],
            attachments: None,
            tags: None,
        }
    }

    pub fn customer(mut self, name: &str) -> Self {
        self.customer_name = name.to_string();
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.customer_email = Some(email.to_string());
        self
    }

    pub fn crm_key(mut self, key: &str) -> Self {
        self.crm_key = Some(key.to_string());
        self
    }

    pub fn site(mut self, site: &str) -> Self {
        self.site = site.to_string();
        self
    }

    pub fn line_item(mut self, room: &str, opening: &str, spec: &str) -> Self {
        self.line_items.push(LineItem {
            room: room.to_string(),
            opening: opening.to_string(),
            size: "-".to_string(),
            qty: 1,
            spec: spec.to_string(),
            price: None,
        });
        self
    }

    pub fn no_line_items(mut self) -> Self {
        self.line_items.clear();
        self
    }

    pub fn build(self) -> JobSpec {
        JobSpec {
            job_id: self.job_id,
            customer: Customer {
                name: self.customer_name,
                email: self.customer_email,
                phone: None,
                address: None,
                crm_key: self.crm_key,
                metadata: None,
            },
            project: Project {
                site: self.site,
                due_date: self.due_date,
                source: ProjectSource::Manual,
            },
            line_items: self.line_items,
            attachments: self.attachments,
            tags: self.tags,
        }
    }
}
