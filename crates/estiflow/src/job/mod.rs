pub mod bundle;
pub mod id;
pub mod spec;

pub use bundle::{
    Building, EstimateType, Footprint, JobBundle, JobInfo, Opening, OpeningKind, Outputs, Pricing,
    Scope, Segment,
};
pub use id::{job_year, make_job_id};
pub use spec::{Attachment, AttachmentKind, Customer, JobSpec, LineItem, Project, ProjectSource};
