/*!
# Project Tracker

A project tracker for courses with group work, built in Rust.

## Overview

Admins (faculty) create group projects with members, milestones and a due date.
Students complete their profile, hand in one PDF submission per project, track
their team's tasks and talk in a per-project message channel. Admins review
submissions, accept or reject them, and assign grades.

## Architecture

The application follows a client-server architecture:

### Frontend Layer
- A browser client that talks to the REST surface below.
- Key Components:
  - Login and registration
  - Profile setup for students and admins
  - Student dashboard with projects, submissions, tasks and team members
  - Admin dashboard for projects, reviews and student accounts

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Typed records for every entity, unknown client fields preserved
  - One store per collection with record-level updates under a lock
  - Workflow rules that govern who may change what
  - REST router with a `{success, ...}` envelope and open CORS

### Data Persistence Layer
- JSON files, one list per collection, written atomically
- Or a single SQLite database with one row per record

## Key Features

- Unique emails across accounts
- One submission per student and project
- Reviewed work (accepted or graded) can no longer be withdrawn
- Expired projects drop out of the active list
- Configurable id strategy (sequential or timestamp)

## Modules

- **models**: Account, Project, Submission, Task and Message records
- **storage**: Raw JSON record backends (files, SQLite)
- **repository**: Typed collections, id assignment and merge updates
- **accounts**, **projects**, **submissions**, **tasks**, **messages**: Per-entity stores
- **attachment**: PDF data URL decoding
- **workflow**: Governing rules across all stores
- **config**: Environment configuration
- **app**: Routing and middleware (`web` feature)

## REST API Endpoints

All routes live under `/make-server-<id>/`:

- `/health` - Liveness check
- `/login` - Verify credentials
- `/accounts`, `/accounts/{email}` - List, create, update accounts
- `/projects`, `/projects/{id}` - Active projects, create, update, delete
- `/submissions`, `/submissions/{id}` - List, create, update, delete
- `/tasks`, `/tasks/{id}` - List, create, update
- `/messages` - List, create
*/

pub mod accounts;
pub mod attachment;
pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod projects;
pub mod repository;
pub mod storage;
pub mod submissions;
pub mod tasks;
pub mod workflow;

#[cfg(feature = "web")]
pub mod app;

pub use error::{AttachmentError, StoreError, WorkflowError};
pub use models::*;
pub use workflow::Tracker;
