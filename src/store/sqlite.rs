use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{Mutation, RecordStore, StoreError, WriteOp};
use crate::db::now_rfc3339;
use crate::records::classes::{
    normalize_clock, ClassPatch, ClassStatus, NewClass, Schedule, Weekday, DEFAULT_CAPACITY,
};
use crate::records::notifications::{NewNotification, NotificationPatch, NotificationStatus};
use crate::records::payments::{NewPayment, PaymentPatch, PaymentStatus, StudentRef, DEFAULT_CURRENCY};
use crate::records::students::{ClassRef, Guardian, NewStudent, StudentPatch, StudentStatus};
use crate::records::users::{NewUser, UserPatch, UserStatus};
use crate::records::{
    AnyRecord, EntityKind, Notification, Payment, SchoolClass, Student, User,
};

const MAX_CAPACITY: i64 = 500;
const MAX_GRADE_LEVEL: i64 = 13;
const DEFAULT_AUDIENCE: &str = "all_parents";

/// [`RecordStore`] over the workspace database.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn load(&self, kind: EntityKind, id: &str) -> Result<AnyRecord, StoreError> {
        Ok(match kind {
            EntityKind::Students => AnyRecord::Student(self.load_student(id)?),
            EntityKind::Classes => AnyRecord::Class(self.load_class(id)?),
            EntityKind::Users => AnyRecord::User(self.load_user(id)?),
            EntityKind::Payments => AnyRecord::Payment(self.load_payment(id)?),
            EntityKind::Notifications => AnyRecord::Notification(self.load_notification(id)?),
        })
    }

    fn ensure_school(&self, school_id: &str) -> Result<(), StoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM schools WHERE id = ?", [school_id], |r| r.get(0))
            .optional()?;
        match exists {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("school", school_id)),
        }
    }

    fn select_many<T>(
        &self,
        sql: &str,
        school_id: &str,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([school_id], map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn select_one<T>(
        &self,
        sql: &str,
        id: &str,
        entity: &'static str,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        self.conn
            .query_row(sql, [id], map)
            .optional()?
            .ok_or_else(|| StoreError::not_found(entity, id))
    }

    fn delete_by_id(&self, table: &str, entity: &'static str, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table);
        let changed = self
            .conn
            .execute(&sql, [id])
            .map_err(write_err(WriteOp::Delete))?;
        if changed == 0 {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }

    // ----- students -----

    fn load_student(&self, id: &str) -> Result<Student, StoreError> {
        let sql = format!("{} WHERE s.id = ?", STUDENT_SELECT);
        self.select_one(&sql, id, "student", student_from_row)
    }

    fn create_student(&self, school_id: &str, payload: &Value) -> Result<Student, StoreError> {
        let new: NewStudent = parse_payload(payload)?;
        let full_name = required("fullName", &new.full_name)?;
        let email = clean(new.email);
        check_email("email", email.as_deref())?;
        let guardian_email = clean(new.guardian_email);
        check_email("guardianEmail", guardian_email.as_deref())?;
        self.ensure_school(school_id)?;

        let class_id = clean(new.class_id);
        if let Some(class_id) = &class_id {
            self.ensure_class_seat(school_id, class_id)?;
        }
        let enrolled_on = new
            .enrolled_on
            .or_else(|| class_id.as_ref().map(|_| Utc::now().date_naive()));

        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO students(
                    id, school_id, class_id, full_name, email, student_no,
                    guardian_name, guardian_email, guardian_phone, status, enrolled_on,
                    created_at, updated_at
                ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    school_id,
                    class_id,
                    full_name,
                    email,
                    clean(new.student_no),
                    clean(new.guardian_name),
                    guardian_email,
                    clean(new.guardian_phone),
                    new.status.unwrap_or(StudentStatus::Pending),
                    enrolled_on,
                    now,
                    now,
                ],
            )
            .map_err(write_err(WriteOp::Insert))?;
        self.load_student(&id)
    }

    fn update_student(&self, id: &str, payload: &Value) -> Result<(), StoreError> {
        let patch: StudentPatch = parse_payload(payload)?;
        let mut s = self.load_student(id)?;
        if let Some(v) = patch.full_name {
            s.full_name = required("fullName", &v)?;
        }
        if let Some(v) = patch.email {
            s.email = clean(Some(v));
        }
        if let Some(v) = patch.student_no {
            s.student_no = clean(Some(v));
        }
        if let Some(v) = patch.guardian_name {
            s.guardian.name = clean(Some(v));
        }
        if let Some(v) = patch.guardian_email {
            s.guardian.email = clean(Some(v));
        }
        if let Some(v) = patch.guardian_phone {
            s.guardian.phone = clean(Some(v));
        }
        if let Some(v) = patch.status {
            s.status = v;
        }
        if patch.enrolled_on.is_some() {
            s.enrolled_on = patch.enrolled_on;
        }
        check_email("email", s.email.as_deref())?;
        check_email("guardianEmail", s.guardian.email.as_deref())?;

        self.conn
            .execute(
                "UPDATE students SET
                    full_name = ?, email = ?, student_no = ?,
                    guardian_name = ?, guardian_email = ?, guardian_phone = ?,
                    status = ?, enrolled_on = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    s.full_name,
                    s.email,
                    s.student_no,
                    s.guardian.name,
                    s.guardian.email,
                    s.guardian.phone,
                    s.status,
                    s.enrolled_on,
                    now_rfc3339(),
                    id,
                ],
            )
            .map_err(write_err(WriteOp::Update))?;
        Ok(())
    }

    fn transfer_student(&self, id: &str, class_id: Option<&str>) -> Result<(), StoreError> {
        let student = self.load_student(id)?;
        let current = student.class.as_ref().map(|c| c.id.as_str());
        if current == class_id {
            return Ok(());
        }
        if let Some(class_id) = class_id {
            self.ensure_class_seat(&student.school_id, class_id)?;
        }
        self.conn
            .execute(
                "UPDATE students SET class_id = ?, enrolled_on = COALESCE(enrolled_on, ?), updated_at = ?
                 WHERE id = ?",
                params![
                    class_id,
                    class_id.map(|_| Utc::now().date_naive()),
                    now_rfc3339(),
                    id
                ],
            )
            .map_err(write_err(WriteOp::Update))?;
        debug!(student = %id, class = ?class_id, "student transferred");
        Ok(())
    }

    fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        let on_err = write_err(WriteOp::Delete);
        let tx = self.conn.unchecked_transaction().map_err(on_err)?;
        tx.execute("DELETE FROM payments WHERE student_id = ?", [id])
            .map_err(on_err)?;
        let changed = tx
            .execute("DELETE FROM students WHERE id = ?", [id])
            .map_err(on_err)?;
        if changed == 0 {
            return Err(StoreError::not_found("student", id));
        }
        tx.commit().map_err(on_err)?;
        Ok(())
    }

    /// The class must live in the same school, be open and have a free seat.
    fn ensure_class_seat(&self, school_id: &str, class_id: &str) -> Result<(), StoreError> {
        let row: Option<(String, i64, i64, ClassStatus)> = self
            .conn
            .query_row(
                "SELECT c.school_id, c.capacity,
                        (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id),
                        c.status
                   FROM classes c WHERE c.id = ?",
                [class_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        let Some((class_school, capacity, enrolled, status)) = row else {
            return Err(StoreError::not_found("class", class_id));
        };
        if class_school != school_id {
            return Err(StoreError::Invalid(
                "class belongs to another school".into(),
            ));
        }
        if status == ClassStatus::Archived {
            return Err(StoreError::Invalid("class is archived".into()));
        }
        if enrolled >= capacity {
            return Err(StoreError::Conflict(format!(
                "class is full ({}/{})",
                enrolled, capacity
            )));
        }
        Ok(())
    }

    // ----- classes -----

    fn load_class(&self, id: &str) -> Result<SchoolClass, StoreError> {
        let sql = format!("{} WHERE c.id = ?", CLASS_SELECT);
        self.select_one(&sql, id, "class", class_from_row)
    }

    fn create_class(&self, school_id: &str, payload: &Value) -> Result<SchoolClass, StoreError> {
        let new: NewClass = parse_payload(payload)?;
        let name = required("name", &new.name)?;
        let capacity = new.capacity.unwrap_or(DEFAULT_CAPACITY);
        check_capacity(capacity)?;
        check_grade(new.grade_level)?;
        let start = clock("scheduleStart", new.schedule_start)?;
        let end = clock("scheduleEnd", new.schedule_end)?;
        check_clock_order(start.as_deref(), end.as_deref())?;
        self.ensure_school(school_id)?;

        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO classes(
                    id, school_id, name, grade_level, teacher_name, room, capacity, status,
                    schedule_day, schedule_start, schedule_end, created_at, updated_at
                ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    school_id,
                    name,
                    new.grade_level,
                    clean(new.teacher_name),
                    clean(new.room),
                    capacity,
                    new.status.unwrap_or(ClassStatus::Active),
                    new.schedule_day,
                    start,
                    end,
                    now,
                    now,
                ],
            )
            .map_err(write_err(WriteOp::Insert))?;
        self.load_class(&id)
    }

    fn update_class(&self, id: &str, payload: &Value) -> Result<(), StoreError> {
        let patch: ClassPatch = parse_payload(payload)?;
        let mut c = self.load_class(id)?;
        if let Some(v) = patch.name {
            c.name = required("name", &v)?;
        }
        if patch.grade_level.is_some() {
            check_grade(patch.grade_level)?;
            c.grade_level = patch.grade_level;
        }
        if let Some(v) = patch.teacher_name {
            c.teacher_name = clean(Some(v));
        }
        if let Some(v) = patch.room {
            c.room = clean(Some(v));
        }
        if let Some(v) = patch.capacity {
            check_capacity(v)?;
            if v < c.enrolled {
                return Err(StoreError::Conflict(format!(
                    "capacity {} is below current enrolment {}",
                    v, c.enrolled
                )));
            }
            c.capacity = v;
        }
        if let Some(v) = patch.status {
            c.status = v;
        }

        let mut day = c.schedule.as_ref().map(|s| s.day);
        let mut start = c.schedule.as_ref().and_then(|s| s.start.clone());
        let mut end = c.schedule.as_ref().and_then(|s| s.end.clone());
        if patch.schedule_day.is_some() {
            day = patch.schedule_day;
        }
        if patch.schedule_start.is_some() {
            start = clock("scheduleStart", patch.schedule_start)?;
        }
        if patch.schedule_end.is_some() {
            end = clock("scheduleEnd", patch.schedule_end)?;
        }
        check_clock_order(start.as_deref(), end.as_deref())?;

        self.conn
            .execute(
                "UPDATE classes SET
                    name = ?, grade_level = ?, teacher_name = ?, room = ?, capacity = ?,
                    status = ?, schedule_day = ?, schedule_start = ?, schedule_end = ?,
                    updated_at = ?
                 WHERE id = ?",
                params![
                    c.name,
                    c.grade_level,
                    c.teacher_name,
                    c.room,
                    c.capacity,
                    c.status,
                    day,
                    start,
                    end,
                    now_rfc3339(),
                    id,
                ],
            )
            .map_err(write_err(WriteOp::Update))?;
        Ok(())
    }

    /// Students keep their records; they just lose the class link.
    fn delete_class(&self, id: &str) -> Result<(), StoreError> {
        let on_err = write_err(WriteOp::Delete);
        let tx = self.conn.unchecked_transaction().map_err(on_err)?;
        tx.execute(
            "UPDATE students SET class_id = NULL, updated_at = ? WHERE class_id = ?",
            (now_rfc3339(), id),
        )
        .map_err(on_err)?;
        let changed = tx
            .execute("DELETE FROM classes WHERE id = ?", [id])
            .map_err(on_err)?;
        if changed == 0 {
            return Err(StoreError::not_found("class", id));
        }
        tx.commit().map_err(on_err)?;
        Ok(())
    }

    // ----- users -----

    fn load_user(&self, id: &str) -> Result<User, StoreError> {
        self.select_one(
            "SELECT id, school_id, full_name, email, role, status, created_at
               FROM users WHERE id = ?",
            id,
            "user",
            user_from_row,
        )
    }

    fn create_user(&self, school_id: &str, payload: &Value) -> Result<User, StoreError> {
        let new: NewUser = parse_payload(payload)?;
        let full_name = required("fullName", &new.full_name)?;
        let email = required("email", &new.email)?.to_ascii_lowercase();
        check_email("email", Some(&email))?;
        self.ensure_school(school_id)?;

        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO users(id, school_id, full_name, email, role, status, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    school_id,
                    full_name,
                    email,
                    new.role,
                    new.status.unwrap_or(UserStatus::Invited),
                    now,
                    now,
                ],
            )
            .map_err(write_err(WriteOp::Insert))?;
        self.load_user(&id)
    }

    fn update_user(&self, id: &str, payload: &Value) -> Result<(), StoreError> {
        let patch: UserPatch = parse_payload(payload)?;
        let mut u = self.load_user(id)?;
        if let Some(v) = patch.full_name {
            u.full_name = required("fullName", &v)?;
        }
        if let Some(v) = patch.email {
            u.email = required("email", &v)?.to_ascii_lowercase();
            check_email("email", Some(&u.email))?;
        }
        if let Some(v) = patch.role {
            u.role = v;
        }
        if let Some(v) = patch.status {
            u.status = v;
        }
        self.conn
            .execute(
                "UPDATE users SET full_name = ?, email = ?, role = ?, status = ?, updated_at = ?
                 WHERE id = ?",
                params![u.full_name, u.email, u.role, u.status, now_rfc3339(), id],
            )
            .map_err(write_err(WriteOp::Update))?;
        Ok(())
    }

    // ----- payments -----

    fn load_payment(&self, id: &str) -> Result<Payment, StoreError> {
        let sql = format!("{} WHERE p.id = ?", PAYMENT_SELECT);
        self.select_one(&sql, id, "payment", payment_from_row)
    }

    fn create_payment(&self, school_id: &str, payload: &Value) -> Result<Payment, StoreError> {
        let new: NewPayment = parse_payload(payload)?;
        let student_id = required("studentId", &new.student_id)?;
        check_amount(new.amount)?;
        let currency = currency(new.currency)?;
        self.ensure_school(school_id)?;

        let student_school: Option<String> = self
            .conn
            .query_row(
                "SELECT school_id FROM students WHERE id = ?",
                [&student_id],
                |r| r.get(0),
            )
            .optional()?;
        match student_school {
            None => return Err(StoreError::not_found("student", &student_id)),
            Some(s) if s != school_id => {
                return Err(StoreError::Invalid(
                    "student belongs to another school".into(),
                ))
            }
            Some(_) => {}
        }

        let status = new.status.unwrap_or(PaymentStatus::Pending);
        let now = now_rfc3339();
        let paid_at = (status == PaymentStatus::Paid).then(|| now.clone());
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO payments(
                    id, school_id, student_id, amount, currency, status, method,
                    due_date, paid_at, description, created_at, updated_at
                ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    school_id,
                    student_id,
                    new.amount,
                    currency,
                    status,
                    new.method,
                    new.due_date,
                    paid_at,
                    clean(new.description),
                    now,
                    now,
                ],
            )
            .map_err(write_err(WriteOp::Insert))?;
        self.load_payment(&id)
    }

    fn update_payment(&self, id: &str, payload: &Value) -> Result<(), StoreError> {
        let patch: PaymentPatch = parse_payload(payload)?;
        let mut p = self.load_payment(id)?;
        if let Some(v) = patch.amount {
            check_amount(v)?;
            p.amount = v;
        }
        if patch.currency.is_some() {
            p.currency = currency(patch.currency)?;
        }
        if let Some(v) = patch.status {
            if v == PaymentStatus::Paid && p.paid_at.is_none() {
                p.paid_at = Some(now_rfc3339());
            }
            p.status = v;
        }
        if patch.method.is_some() {
            p.method = patch.method;
        }
        if patch.due_date.is_some() {
            p.due_date = patch.due_date;
        }
        if let Some(v) = patch.description {
            p.description = clean(Some(v));
        }
        self.conn
            .execute(
                "UPDATE payments SET
                    amount = ?, currency = ?, status = ?, method = ?, due_date = ?,
                    paid_at = ?, description = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    p.amount,
                    p.currency,
                    p.status,
                    p.method,
                    p.due_date,
                    p.paid_at,
                    p.description,
                    now_rfc3339(),
                    id,
                ],
            )
            .map_err(write_err(WriteOp::Update))?;
        Ok(())
    }

    // ----- notifications -----

    fn load_notification(&self, id: &str) -> Result<Notification, StoreError> {
        self.select_one(
            "SELECT id, school_id, title, message, channel, audience, recipient_count,
                    status, sent_at, created_at
               FROM notifications WHERE id = ?",
            id,
            "notification",
            notification_from_row,
        )
    }

    fn create_notification(
        &self,
        school_id: &str,
        payload: &Value,
    ) -> Result<Notification, StoreError> {
        let new: NewNotification = parse_payload(payload)?;
        let title = required("title", &new.title)?;
        let message = required("message", &new.message)?;
        let recipients = new.recipient_count.unwrap_or(0);
        check_recipients(recipients)?;
        self.ensure_school(school_id)?;

        let status = new.status.unwrap_or(NotificationStatus::Draft);
        let now = now_rfc3339();
        let sent_at = (status == NotificationStatus::Sent).then(|| now.clone());
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO notifications(
                    id, school_id, title, message, channel, audience, recipient_count,
                    status, sent_at, created_at, updated_at
                ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    school_id,
                    title,
                    message,
                    new.channel,
                    clean(new.audience).unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
                    recipients,
                    status,
                    sent_at,
                    now,
                    now,
                ],
            )
            .map_err(write_err(WriteOp::Insert))?;
        self.load_notification(&id)
    }

    fn update_notification(&self, id: &str, payload: &Value) -> Result<(), StoreError> {
        let patch: NotificationPatch = parse_payload(payload)?;
        let mut n = self.load_notification(id)?;
        if let Some(v) = patch.title {
            n.title = required("title", &v)?;
        }
        if let Some(v) = patch.message {
            n.message = required("message", &v)?;
        }
        if let Some(v) = patch.channel {
            n.channel = v;
        }
        if let Some(v) = patch.audience {
            n.audience = clean(Some(v)).unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());
        }
        if let Some(v) = patch.recipient_count {
            check_recipients(v)?;
            n.recipient_count = v;
        }
        if let Some(v) = patch.status {
            if v == NotificationStatus::Sent && n.sent_at.is_none() {
                n.sent_at = Some(now_rfc3339());
            }
            n.status = v;
        }
        self.conn
            .execute(
                "UPDATE notifications SET
                    title = ?, message = ?, channel = ?, audience = ?, recipient_count = ?,
                    status = ?, sent_at = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    n.title,
                    n.message,
                    n.channel,
                    n.audience,
                    n.recipient_count,
                    n.status,
                    n.sent_at,
                    now_rfc3339(),
                    id,
                ],
            )
            .map_err(write_err(WriteOp::Update))?;
        Ok(())
    }

    // ----- shared -----

    fn set_status(&self, kind: EntityKind, id: &str, raw: &str) -> Result<(), StoreError> {
        let Some(token) = kind.parse_status(raw) else {
            return Err(StoreError::Invalid(format!(
                "status must be one of: {}",
                kind.status_tokens()
            )));
        };
        let now = now_rfc3339();
        let sql = match kind {
            EntityKind::Payments => {
                "UPDATE payments SET status = ?1, updated_at = ?2,
                    paid_at = CASE WHEN ?1 = 'paid' THEN COALESCE(paid_at, ?2) ELSE paid_at END
                 WHERE id = ?3"
            }
            EntityKind::Notifications => {
                "UPDATE notifications SET status = ?1, updated_at = ?2,
                    sent_at = CASE WHEN ?1 = 'sent' THEN COALESCE(sent_at, ?2) ELSE sent_at END
                 WHERE id = ?3"
            }
            EntityKind::Students => "UPDATE students SET status = ?1, updated_at = ?2 WHERE id = ?3",
            EntityKind::Classes => "UPDATE classes SET status = ?1, updated_at = ?2 WHERE id = ?3",
            EntityKind::Users => "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
        };
        let changed = self
            .conn
            .execute(sql, params![token, now, id])
            .map_err(write_err(WriteOp::Update))?;
        if changed == 0 {
            return Err(StoreError::not_found(kind.noun(), id));
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore<'_> {
    fn fetch_records(
        &self,
        kind: EntityKind,
        school_id: &str,
    ) -> Result<Vec<AnyRecord>, StoreError> {
        let records = match kind {
            EntityKind::Students => {
                let sql = format!(
                    "{} WHERE s.school_id = ? ORDER BY s.full_name COLLATE NOCASE, s.id",
                    STUDENT_SELECT
                );
                self.select_many(&sql, school_id, student_from_row)?
                    .into_iter()
                    .map(AnyRecord::Student)
                    .collect()
            }
            EntityKind::Classes => {
                let sql = format!(
                    "{} WHERE c.school_id = ? ORDER BY c.name COLLATE NOCASE, c.id",
                    CLASS_SELECT
                );
                self.select_many(&sql, school_id, class_from_row)?
                    .into_iter()
                    .map(AnyRecord::Class)
                    .collect()
            }
            EntityKind::Users => self
                .select_many(
                    "SELECT id, school_id, full_name, email, role, status, created_at
                       FROM users WHERE school_id = ?
                      ORDER BY full_name COLLATE NOCASE, id",
                    school_id,
                    user_from_row,
                )?
                .into_iter()
                .map(AnyRecord::User)
                .collect(),
            EntityKind::Payments => {
                let sql = format!(
                    "{} WHERE p.school_id = ? ORDER BY p.created_at DESC, p.id",
                    PAYMENT_SELECT
                );
                self.select_many(&sql, school_id, payment_from_row)?
                    .into_iter()
                    .map(AnyRecord::Payment)
                    .collect()
            }
            EntityKind::Notifications => self
                .select_many(
                    "SELECT id, school_id, title, message, channel, audience, recipient_count,
                            status, sent_at, created_at
                       FROM notifications WHERE school_id = ?
                      ORDER BY created_at DESC, id",
                    school_id,
                    notification_from_row,
                )?
                .into_iter()
                .map(AnyRecord::Notification)
                .collect(),
        };
        Ok(records)
    }

    fn create_record(
        &self,
        kind: EntityKind,
        school_id: &str,
        payload: &Value,
    ) -> Result<AnyRecord, StoreError> {
        let record = match kind {
            EntityKind::Students => AnyRecord::Student(self.create_student(school_id, payload)?),
            EntityKind::Classes => AnyRecord::Class(self.create_class(school_id, payload)?),
            EntityKind::Users => AnyRecord::User(self.create_user(school_id, payload)?),
            EntityKind::Payments => AnyRecord::Payment(self.create_payment(school_id, payload)?),
            EntityKind::Notifications => {
                AnyRecord::Notification(self.create_notification(school_id, payload)?)
            }
        };
        debug!(entity = kind.as_str(), school = %school_id, "record created");
        Ok(record)
    }

    fn mutate_record(
        &self,
        kind: EntityKind,
        id: &str,
        mutation: Mutation,
    ) -> Result<(), StoreError> {
        match (kind, mutation) {
            (_, Mutation::SetStatus(raw)) => self.set_status(kind, id, &raw),
            (EntityKind::Students, Mutation::Transfer { class_id }) => {
                self.transfer_student(id, class_id.as_deref())
            }
            (_, Mutation::Transfer { .. }) => Err(StoreError::Invalid(format!(
                "{} cannot be transferred",
                kind.as_str()
            ))),
            (EntityKind::Students, Mutation::Update(p)) => self.update_student(id, &p),
            (EntityKind::Classes, Mutation::Update(p)) => self.update_class(id, &p),
            (EntityKind::Users, Mutation::Update(p)) => self.update_user(id, &p),
            (EntityKind::Payments, Mutation::Update(p)) => self.update_payment(id, &p),
            (EntityKind::Notifications, Mutation::Update(p)) => self.update_notification(id, &p),
            (EntityKind::Students, Mutation::Delete) => self.delete_student(id),
            (EntityKind::Classes, Mutation::Delete) => self.delete_class(id),
            (EntityKind::Users, Mutation::Delete) => self.delete_by_id("users", "user", id),
            (EntityKind::Payments, Mutation::Delete) => {
                self.delete_by_id("payments", "payment", id)
            }
            (EntityKind::Notifications, Mutation::Delete) => {
                self.delete_by_id("notifications", "notification", id)
            }
        }
    }
}

const STUDENT_SELECT: &str = "SELECT s.id, s.school_id, s.class_id, c.name, s.full_name, s.email,
        s.student_no, s.guardian_name, s.guardian_email, s.guardian_phone, s.status,
        s.enrolled_on
   FROM students s LEFT JOIN classes c ON c.id = s.class_id";

const CLASS_SELECT: &str = "SELECT c.id, c.school_id, c.name, c.grade_level, c.teacher_name,
        c.room, c.capacity,
        (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS enrolled,
        c.status, c.schedule_day, c.schedule_start, c.schedule_end
   FROM classes c";

const PAYMENT_SELECT: &str = "SELECT p.id, p.school_id, p.student_id, st.full_name, p.amount,
        p.currency, p.status, p.method, p.due_date, p.paid_at, p.description
   FROM payments p JOIN students st ON st.id = p.student_id";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let class_id: Option<String> = row.get(2)?;
    let class_name: Option<String> = row.get(3)?;
    Ok(Student {
        id: row.get(0)?,
        school_id: row.get(1)?,
        class: match (class_id, class_name) {
            (Some(id), Some(name)) => Some(ClassRef { id, name }),
            _ => None,
        },
        full_name: row.get(4)?,
        email: row.get(5)?,
        student_no: row.get(6)?,
        guardian: Guardian {
            name: row.get(7)?,
            email: row.get(8)?,
            phone: row.get(9)?,
        },
        status: row.get(10)?,
        enrolled_on: row.get(11)?,
    })
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<SchoolClass> {
    let day: Option<Weekday> = row.get(9)?;
    let start: Option<String> = row.get(10)?;
    let end: Option<String> = row.get(11)?;
    Ok(SchoolClass {
        id: row.get(0)?,
        school_id: row.get(1)?,
        name: row.get(2)?,
        grade_level: row.get(3)?,
        teacher_name: row.get(4)?,
        room: row.get(5)?,
        capacity: row.get(6)?,
        enrolled: row.get(7)?,
        status: row.get(8)?,
        schedule: day.map(|day| Schedule { day, start, end }),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        school_id: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        role: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        school_id: row.get(1)?,
        student: StudentRef {
            id: row.get(2)?,
            full_name: row.get(3)?,
        },
        amount: row.get(4)?,
        currency: row.get(5)?,
        status: row.get(6)?,
        method: row.get(7)?,
        due_date: row.get(8)?,
        paid_at: row.get(9)?,
        description: row.get(10)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        school_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        channel: row.get(4)?,
        audience: row.get(5)?,
        recipient_count: row.get(6)?,
        status: row.get(7)?,
        sent_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, StoreError> {
    serde_json::from_value(payload.clone()).map_err(|e| StoreError::Invalid(e.to_string()))
}

/// Constraint violations are the caller's problem, everything else is ours.
/// Constraint violations become conflicts; anything else keeps its write kind.
fn write_err(op: WriteOp) -> impl Fn(rusqlite::Error) -> StoreError + Copy {
    move |e| {
        if let rusqlite::Error::SqliteFailure(f, msg) = &e {
            if f.code == ErrorCode::ConstraintViolation {
                let detail = msg.clone().unwrap_or_else(|| "constraint violation".into());
                return StoreError::Conflict(detail);
            }
        }
        StoreError::Write { op, source: e }
    }
}

fn clean(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required(field: &str, v: &str) -> Result<String, StoreError> {
    let t = v.trim();
    if t.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

fn check_email(field: &str, v: Option<&str>) -> Result<(), StoreError> {
    let Some(v) = v else {
        return Ok(());
    };
    let ok = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !ok || v.contains(char::is_whitespace) {
        return Err(StoreError::Invalid(format!(
            "{} is not a valid email address",
            field
        )));
    }
    Ok(())
}

fn check_capacity(capacity: i64) -> Result<(), StoreError> {
    if !(1..=MAX_CAPACITY).contains(&capacity) {
        return Err(StoreError::Invalid(format!(
            "capacity must be between 1 and {}",
            MAX_CAPACITY
        )));
    }
    Ok(())
}

fn check_grade(grade: Option<i64>) -> Result<(), StoreError> {
    match grade {
        Some(g) if !(0..=MAX_GRADE_LEVEL).contains(&g) => Err(StoreError::Invalid(format!(
            "gradeLevel must be between 0 and {}",
            MAX_GRADE_LEVEL
        ))),
        _ => Ok(()),
    }
}

fn clock(field: &str, raw: Option<String>) -> Result<Option<String>, StoreError> {
    match clean(raw) {
        None => Ok(None),
        Some(s) => normalize_clock(&s)
            .map(Some)
            .ok_or_else(|| StoreError::Invalid(format!("{} must be HH:MM", field))),
    }
}

fn check_clock_order(start: Option<&str>, end: Option<&str>) -> Result<(), StoreError> {
    if let (Some(s), Some(e)) = (start, end) {
        // Both are normalized HH:MM, so text order is time order.
        if e <= s {
            return Err(StoreError::Invalid(
                "scheduleEnd must be after scheduleStart".into(),
            ));
        }
    }
    Ok(())
}

fn check_amount(amount: f64) -> Result<(), StoreError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(StoreError::Invalid(
            "amount must be zero or positive".into(),
        ));
    }
    Ok(())
}

fn currency(raw: Option<String>) -> Result<String, StoreError> {
    let code = clean(raw)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
        .to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(StoreError::Invalid(
            "currency must be a three-letter code".into(),
        ));
    }
    Ok(code)
}

fn check_recipients(n: i64) -> Result<(), StoreError> {
    if n < 0 {
        return Err(StoreError::Invalid(
            "recipientCount must not be negative".into(),
        ));
    }
    Ok(())
}
