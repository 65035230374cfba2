pub const INSERT_VEHICLE: &str = r#"
INSERT INTO vehicles (id, in_use, battery, vehicle_info)
VALUES ($1, false, $2, $3)
RETURNING id, in_use, battery, vehicle_info, serial_number;
"#;

pub const SELECT_VEHICLE: &str = r#"
SELECT id, in_use, battery, vehicle_info, serial_number FROM vehicles WHERE id = $1;
"#;

pub const SELECT_VEHICLES_WITH_LAST_LOCATION: &str = r#"
SELECT
    v.id AS id,
    v.in_use AS in_use,
    v.battery AS battery,
    v.vehicle_info AS vehicle_info,
    l.ts AS last_checkin,
    l.latitude AS last_latitude,
    l.longitude AS last_longitude
FROM vehicles AS v
INNER JOIN location_history AS l ON v.id = l.vehicle_id
INNER JOIN (
    SELECT vehicle_id, MAX(ts) AS max_ts
    FROM location_history
    GROUP BY vehicle_id
) AS g ON g.vehicle_id = l.vehicle_id AND g.max_ts = l.ts
ORDER BY l.ts DESC
LIMIT $1;
"#;

pub const CLAIM_VEHICLE: &str = r#"
UPDATE vehicles SET in_use = true WHERE id = $1 AND in_use = false;
"#;

pub const RELEASE_VEHICLE: &str = r#"
UPDATE vehicles
SET in_use = false,
    battery = $2
WHERE id = $1 AND in_use = true;
"#;

pub const DELETE_IDLE_VEHICLE: &str = r#"
DELETE FROM vehicles WHERE id = $1 AND in_use = false;
"#;

pub const SELECT_LAST_LOCATION: &str = r#"
SELECT id, vehicle_id, ts, latitude, longitude
FROM location_history
WHERE vehicle_id = $1
ORDER BY ts DESC
LIMIT 1;
"#;

pub const INSERT_LOCATION: &str = r#"
INSERT INTO location_history (id, vehicle_id, ts, latitude, longitude)
VALUES ($1, $2, $3, $4, $5);
"#;

pub const SELECT_LOCATION_HISTORY: &str = r#"
SELECT id, vehicle_id, ts, latitude, longitude
FROM location_history
WHERE vehicle_id = $1
ORDER BY ts DESC
LIMIT $2;
"#;

pub const INSERT_RIDE: &str = r#"
INSERT INTO rides (id, vehicle_id, user_email, start_ts, end_ts)
VALUES ($1, $2, $3, $4, $5);
"#;

pub const SELECT_RIDE: &str = r#"
SELECT id, vehicle_id, user_email, start_ts, end_ts FROM rides WHERE id = $1;
"#;

pub const SELECT_OPEN_RIDE_FOR_VEHICLE: &str = r#"
SELECT id FROM rides WHERE vehicle_id = $1 AND end_ts IS NULL LIMIT 1;
"#;

pub const CLOSE_RIDE: &str = r#"
UPDATE rides
SET end_ts = $2
WHERE id = $1 AND end_ts IS NULL
RETURNING vehicle_id, start_ts;
"#;

pub const SELECT_ACTIVE_RIDE: &str = r#"
SELECT
    r.id AS ride_id,
    v.id AS id,
    v.in_use AS in_use,
    v.battery AS battery,
    v.vehicle_info AS vehicle_info,
    lh.ts AS last_checkin,
    lh.latitude AS last_latitude,
    lh.longitude AS last_longitude
FROM rides AS r
INNER JOIN vehicles AS v ON r.vehicle_id = v.id
INNER JOIN location_history AS lh ON lh.vehicle_id = v.id
WHERE r.vehicle_id = $1
  AND r.user_email = $2
  AND r.end_ts IS NULL
  AND v.in_use = true
  AND lh.ts = r.start_ts
ORDER BY lh.ts DESC
LIMIT 1;
"#;

pub const SELECT_RIDES_BY_USER: &str = r#"
SELECT
    r.id AS ride_id,
    r.vehicle_id AS vehicle_id,
    v.vehicle_info AS vehicle_info,
    r.start_ts AS start_ts,
    r.end_ts AS end_ts,
    v.in_use AS in_use
FROM rides AS r
INNER JOIN vehicles AS v ON v.id = r.vehicle_id
WHERE r.user_email = $1
ORDER BY r.start_ts DESC;
"#;

pub const INSERT_USER: &str = r#"
INSERT INTO users (email, last_name, first_name, phone_numbers)
VALUES ($1, $2, $3, $4);
"#;

pub const SELECT_USER: &str = r#"
SELECT email, last_name, first_name, phone_numbers FROM users WHERE email = $1;
"#;

pub const DELETE_USER: &str = r#"
DELETE FROM users WHERE email = $1;
"#;
